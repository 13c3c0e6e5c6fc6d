use std::path::PathBuf;
use std::time::Duration;

/// Process configuration, read from the environment (`.env` is loaded in debug builds).
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    /// Snapshot directory for the in-memory store; `None` keeps sources in memory only.
    pub data_dir: Option<PathBuf>,
    pub allowed_origins: Vec<String>,
    pub upstream_connect_timeout: Duration,
    pub metrics_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |name: &str, default: bool| {
            non_empty(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(default)
        };
        Self {
            host: non_empty("BOORUMESH_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080),
            database_url: non_empty("DATABASE_URL"),
            data_dir: non_empty("BOORUMESH_DATA_DIR").map(PathBuf::from),
            allowed_origins: non_empty("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
                .unwrap_or_default(),
            upstream_connect_timeout: Duration::from_millis(
                non_empty("UPSTREAM_CONNECT_TIMEOUT_MS").and_then(|v| v.parse().ok()).unwrap_or(2000),
            ),
            metrics_enabled: flag("METRICS_ENABLED", true),
        }
    }
}
