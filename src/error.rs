use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Failures of a single `fetch_by_source` call. None of them are retried.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("source code is required")] MissingCode,
    #[error("source not found")] SourceNotFound,
    #[error("source is disabled")] SourceDisabled,
    #[error("invalid source mapping: {0}")] Config(String),
    #[error("upstream request timed out")] Timeout,
    #[error("upstream returned status {0}")] UpstreamStatus(u16),
    #[error("upstream transport error: {0}")] Transport(String),
    #[error("failed to decode upstream json: {0}")] Decode(String),
    #[error("repository error: {0}")] Repo(RepoError),
}

impl FetchError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::MissingCode => "missing_code",
            FetchError::SourceNotFound => "not_found",
            FetchError::SourceDisabled => "disabled",
            FetchError::Config(_) => "config",
            FetchError::Timeout => "timeout",
            FetchError::UpstreamStatus(_) => "upstream_status",
            FetchError::Transport(_) => "transport",
            FetchError::Decode(_) => "decode",
            FetchError::Repo(_) => "repo",
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RegistrationError {
    #[error("{0}")] Invalid(String),
    #[error("source already exists")] Conflict,
    #[error("source not found")] NotFound,
    #[error("repository error: {0}")] Repo(RepoError),
}

impl From<RepoError> for RegistrationError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => RegistrationError::NotFound,
            RepoError::Conflict => RegistrationError::Conflict,
            other => RegistrationError::Repo(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] BadRequest(String),
    #[error("{0}")] NotFound(String),
    #[error("conflict")] Conflict,
    #[error("failed to fetch from source")] BadGateway(String),
    #[error("upstream timed out")] GatewayTimeout,
    #[error("internal error")] Internal(Option<String>),
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::MissingCode => ApiError::BadRequest("source is required".into()),
            FetchError::SourceNotFound => ApiError::NotFound("source not found".into()),
            FetchError::SourceDisabled => ApiError::BadRequest("source is disabled".into()),
            FetchError::Timeout => ApiError::GatewayTimeout,
            e @ (FetchError::UpstreamStatus(_) | FetchError::Transport(_) | FetchError::Decode(_)) => {
                ApiError::BadGateway(e.to_string())
            }
            e @ FetchError::Config(_) => ApiError::Internal(Some(e.to_string())),
            FetchError::Repo(_) => ApiError::Internal(None),
        }
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Invalid(msg) => ApiError::BadRequest(msg),
            RegistrationError::Conflict => ApiError::Conflict,
            RegistrationError::NotFound => ApiError::NotFound("source not found".into()),
            RegistrationError::Repo(_) => ApiError::Internal(None),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            ApiError::BadGateway(d) => Some(d.clone()),
            ApiError::Internal(d) => d.clone(),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string(), detail })
    }
}
