//! Source registration: normalization of operator payloads, validation, and
//! lookups used by the `/dev/sources` endpoints.

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use tracing::info;

use crate::error::RegistrationError;
use crate::models::*;
use crate::repo::SourceRepo;

pub const DEFAULT_USER_AGENT: &str = "boorumesh/1.0";
pub const DEFAULT_TAGS_PARAM: &str = "tags";
pub const DEFAULT_LIMIT_PARAM: &str = "limit";
pub const DEFAULT_PAGE_PARAM: &str = "page";

fn invalid(msg: &str) -> RegistrationError { RegistrationError::Invalid(msg.to_string()) }

/// Validate a registration payload and fill in every default the fetch path relies on.
pub fn normalize(input: SourceRegistration) -> Result<NewSource, RegistrationError> {
    let code = input.code.trim();
    let name = input.name.trim();
    let base = input.base_url.trim();

    if code.is_empty() { return Err(invalid("code is required")); }
    if name.is_empty() { return Err(invalid("name is required")); }
    if base.is_empty() { return Err(invalid("base_url is required")); }
    match Url::parse(base) {
        Ok(u) if matches!(u.scheme(), "http" | "https") && u.has_host() => {}
        _ => return Err(invalid("base_url invalid")),
    }
    if input.request.posts_path.trim().is_empty() {
        return Err(invalid("request.posts_path is required"));
    }
    for (name, value) in &input.request.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
            return Err(RegistrationError::Invalid(format!("request.headers: invalid header '{name}'")));
        }
    }
    if input.mapping.field("id").is_none() || input.mapping.field("file_url").is_none() {
        return Err(invalid("mapping.fields must include at least 'id' and 'file_url'"));
    }

    let mut request = input.request;
    if request.tags_param.is_empty() { request.tags_param = DEFAULT_TAGS_PARAM.into(); }
    if request.limit_param.is_empty() { request.limit_param = DEFAULT_LIMIT_PARAM.into(); }
    if request.page_param.is_empty() { request.page_param = DEFAULT_PAGE_PARAM.into(); }
    if !request.headers.keys().any(|k| k.eq_ignore_ascii_case("user-agent")) {
        request.headers.insert("User-Agent".into(), DEFAULT_USER_AGENT.into());
    }

    let mut defaults = input.defaults;
    if defaults.max_limit == 0 { defaults.max_limit = DEFAULT_MAX_LIMIT; }
    if defaults.timeout_ms == 0 { defaults.timeout_ms = DEFAULT_TIMEOUT_MS; }

    Ok(NewSource {
        code: SourceCode::new(code),
        name: name.to_string(),
        base_url: base.trim_end_matches('/').to_string(),
        enabled: input.enabled.unwrap_or(true),
        request,
        mapping: input.mapping,
        defaults,
    })
}

pub async fn register_source(repo: &dyn SourceRepo, input: SourceRegistration) -> Result<Source, RegistrationError> {
    let new = normalize(input)?;
    let source = repo.create_source(new).await?;
    info!(code = %source.code, base_url = %source.base_url, enabled = source.enabled, "registered source");
    Ok(source)
}

pub async fn get_source(repo: &dyn SourceRepo, code: &str) -> Result<Source, RegistrationError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(invalid("code is required"));
    }
    Ok(repo.get_source_by_code(&SourceCode::new(code)).await?)
}
