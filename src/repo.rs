use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence port for source configurations. Reads must be safe for
/// unlimited concurrent callers; code uniqueness is the store's job.
#[async_trait]
pub trait SourceRepo: Send + Sync {
    async fn create_source(&self, new: NewSource) -> RepoResult<Source>;
    async fn get_source_by_code(&self, code: &SourceCode) -> RepoResult<Source>;
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock};
    use tracing::{info, warn};

    const SNAPSHOT_FILE: &str = "sources.json";

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        sources: HashMap<SourceCode, Source>,
        next_id: Id,
    }

    /// Process-local store, optionally mirrored to a JSON snapshot so dev
    /// registrations survive restarts.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        pub fn new() -> Self { Self::default() }

        /// Load (or start) a snapshot under `dir`; every write rewrites it.
        pub fn with_snapshot_dir(dir: &Path) -> Self {
            let path = dir.join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), sources = s.sources.len(), "loaded source snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "failed to parse source snapshot: {e}; starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), "no source snapshot ({e}); starting empty");
                    State::default()
                }
            }
        }

        /// Writes `state` to the snapshot file. Callers hold the write lock so
        /// the file never lags behind a committed insert.
        fn persist(&self, state: &State) -> RepoResult<()> {
            let Some(path) = self.snapshot_path.as_ref() else { return Ok(()) };
            let bytes = serde_json::to_vec_pretty(state).map_err(|e| RepoError::Internal(e.to_string()))?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(|e| RepoError::Internal(e.to_string()))?;
            }
            std::fs::write(path.as_path(), bytes).map_err(|e| {
                warn!(path = %path.display(), "failed to write source snapshot: {e}");
                RepoError::Internal(e.to_string())
            })
        }
    }

    #[async_trait]
    impl SourceRepo for InMemRepo {
        async fn create_source(&self, new: NewSource) -> RepoResult<Source> {
            let mut s = self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))?;
            if s.sources.contains_key(&new.code) {
                return Err(RepoError::Conflict);
            }
            s.next_id += 1;
            let now = Utc::now();
            let source = Source {
                id: s.next_id,
                code: new.code,
                name: new.name,
                base_url: new.base_url,
                enabled: new.enabled,
                request: new.request,
                mapping: new.mapping,
                defaults: new.defaults,
                created_at: now,
                updated_at: now,
            };
            s.sources.insert(source.code.clone(), source.clone());
            if let Err(e) = self.persist(&s) {
                // roll back so a failed create leaves no trace
                s.sources.remove(&source.code);
                s.next_id -= 1;
                return Err(e);
            }
            Ok(source)
        }

        async fn get_source_by_code(&self, code: &SourceCode) -> RepoResult<Source> {
            let s = self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))?;
            s.sources.get(code).cloned().ok_or(RepoError::NotFound)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use chrono::{DateTime, Utc};
    use sqlx::types::Json;
    use sqlx::{Pool, Postgres};

    const UNIQUE_VIOLATION: &str = "23505";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    // request/mapping/defaults live in JSONB columns
    #[derive(sqlx::FromRow)]
    struct SourceRow {
        id: Id,
        code: String,
        name: String,
        base_url: String,
        enabled: bool,
        request: Json<RequestConfig>,
        mapping: Json<SourceMapping>,
        defaults: Json<SourceDefaults>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl From<SourceRow> for Source {
        fn from(r: SourceRow) -> Self {
            Source {
                id: r.id,
                code: SourceCode(r.code),
                name: r.name,
                base_url: r.base_url,
                enabled: r.enabled,
                request: r.request.0,
                mapping: r.mapping.0,
                defaults: r.defaults.0,
                created_at: r.created_at,
                updated_at: r.updated_at,
            }
        }
    }

    fn internal(e: sqlx::Error) -> RepoError { RepoError::Internal(e.to_string()) }

    #[async_trait]
    impl SourceRepo for PgRepo {
        async fn create_source(&self, new: NewSource) -> RepoResult<Source> {
            let row = sqlx::query_as::<_, SourceRow>(r#"
                INSERT INTO sources (code, name, base_url, enabled, request, mapping, defaults)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, code, name, base_url, enabled, request, mapping, defaults, created_at, updated_at
            "#)
                .bind(new.code.as_str())
                .bind(&new.name)
                .bind(&new.base_url)
                .bind(new.enabled)
                .bind(Json(&new.request))
                .bind(Json(&new.mapping))
                .bind(Json(&new.defaults))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    let unique = matches!(&e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION));
                    if unique { RepoError::Conflict } else { internal(e) }
                })?;
            Ok(row.into())
        }

        async fn get_source_by_code(&self, code: &SourceCode) -> RepoResult<Source> {
            let row = sqlx::query_as::<_, SourceRow>(r#"
                SELECT id, code, name, base_url, enabled, request, mapping, defaults, created_at, updated_at
                FROM sources
                WHERE code = $1
            "#)
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
            row.map(Source::from).ok_or(RepoError::NotFound)
        }
    }
}
