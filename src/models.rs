use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

pub const DEFAULT_MAX_LIMIT: u32 = 100;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Routing key callers use to address a source (`/api/{code}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct SourceCode(pub String);

impl SourceCode {
    pub fn new(code: impl Into<String>) -> Self { Self(code.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SourceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldMapping {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
}

impl FieldMapping {
    pub fn key(key: impl Into<String>) -> Self { Self { key: key.into(), split: None } }
}

/// Canonical field name (`id`, `file_url`, `tags`, ...) -> upstream key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceMapping {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMapping>,
}

impl SourceMapping {
    /// Mapping for `field` when present with a non-empty key.
    pub fn field(&self, field: &str) -> Option<&FieldMapping> {
        self.fields.get(field).filter(|m| !m.key.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestConfig {
    pub posts_path: String,
    #[serde(default)]
    pub tags_param: String,
    #[serde(default)]
    pub limit_param: String,
    #[serde(default)]
    pub page_param: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_query: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_suffix: Option<String>,
    #[serde(default)]
    pub max_limit: u32,
    #[serde(default)]
    pub timeout_ms: u64,
}

impl SourceDefaults {
    /// Upper bound for any requested limit; 0 means unset.
    pub fn max_limit(&self) -> u32 {
        if self.max_limit == 0 { DEFAULT_MAX_LIMIT } else { self.max_limit }
    }

    /// Per-request deadline; 0 means unset.
    pub fn timeout(&self) -> Duration {
        let ms = if self.timeout_ms == 0 { DEFAULT_TIMEOUT_MS } else { self.timeout_ms };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Source {
    pub id: Id,
    pub code: SourceCode,
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
    pub request: RequestConfig,
    pub mapping: SourceMapping,
    pub defaults: SourceDefaults,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated, normalized source ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSource {
    pub code: SourceCode,
    pub name: String,
    pub base_url: String,
    pub enabled: bool,
    pub request: RequestConfig,
    pub mapping: SourceMapping,
    pub defaults: SourceDefaults,
}

/// Registration payload as received from operators, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SourceRegistration {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub request: RequestConfig,
    #[serde(default)]
    pub mapping: SourceMapping,
    #[serde(default)]
    pub defaults: SourceDefaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Explicit,
    Sensitive,
    General,
    Questionable,
}

impl Rating {
    /// Lenient parse of the rating spellings boorus use (`e`, `Safe`, `questionable`, ...).
    pub fn parse_loose(s: &str) -> Option<Rating> {
        match s.trim().to_lowercase().as_str() {
            "e" | "explicit" => Some(Rating::Explicit),
            "q" | "questionable" => Some(Rating::Questionable),
            "s" | "sensitive" => Some(Rating::Sensitive),
            "g" | "general" | "safe" => Some(Rating::General),
            _ => None,
        }
    }
}

/// Canonical image record, identical whatever board produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Image {
    pub id: String,
    pub source: SourceCode,
    pub created_at: Option<DateTime<Utc>>,
    pub rating: Option<Rating>,
    pub tags: Vec<String>,
    pub has_children: bool,
    pub parent_id: String,
    pub md5: String,
    pub preview_url: String,
    pub sample_url: String,
    pub image_src_url: String,
    pub file_url: String,
}
