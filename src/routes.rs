use std::sync::Arc;

use actix_web::{web, HttpResponse};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;

use crate::error::ApiError;
use crate::fetch::{FetchQuery, SourceFetcher};
use crate::models::*;
use crate::registry;
use crate::repo::SourceRepo;

pub const SKIPPED_HEADER: &str = "X-Skipped-Records";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_export))
        .service(
            web::scope("/dev")
                .service(web::resource("/sources").route(web::post().to(create_source)))
                .service(web::resource("/sources/{code}").route(web::get().to(get_source))),
        )
        .service(web::scope("/api").service(web::resource("/{source}").route(web::get().to(get_images))));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn SourceRepo>,
    pub fetcher: SourceFetcher,
    pub metrics: Option<PrometheusHandle>,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn metrics_export(data: web::Data<AppState>) -> HttpResponse {
    match &data.metrics {
        Some(handle) => HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(handle.render()),
        None => HttpResponse::NotFound().finish(),
    }
}

#[utoipa::path(
    post,
    path = "/dev/sources",
    request_body = SourceRegistration,
    responses(
        (status = 201, description = "Source registered", body = Source),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Source code already exists")
    )
)]
pub async fn create_source(
    data: web::Data<AppState>,
    payload: web::Json<SourceRegistration>,
) -> Result<HttpResponse, ApiError> {
    let source = registry::register_source(&*data.repo, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(source))
}

#[utoipa::path(
    get,
    path = "/dev/sources/{code}",
    params(("code" = String, Path, description = "Source code")),
    responses(
        (status = 200, description = "Source configuration", body = Source),
        (status = 404, description = "Source not found")
    )
)]
pub async fn get_source(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let source = registry::get_source(&*data.repo, &path.into_inner()).await.map_err(|e| {
        log::warn!("source lookup failed: {e}");
        ApiError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(source))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImagesQuery {
    pub tags: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub raw: Option<String>,
}

impl ImagesQuery {
    /// Space separated tags; unparsable or non-positive numbers fall back to defaults.
    pub fn into_fetch_query(self) -> FetchQuery {
        let positive = |v: Option<String>| v.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n > 0).unwrap_or(0);
        FetchQuery {
            tags: self
                .tags
                .map(|t| t.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            page: positive(self.page),
            limit: positive(self.limit),
            raw: self.raw.as_deref() == Some("1"),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/{source}",
    params(
        ("source" = String, Path, description = "Source code"),
        ("tags" = Option<String>, Query, description = "Space separated tags"),
        ("page" = Option<i64>, Query, description = "Page, defaults to 1"),
        ("limit" = Option<i64>, Query, description = "Page size, capped by the source's max_limit"),
        ("raw" = Option<String>, Query, description = "`1` disables the source's tag suffix")
    ),
    responses(
        (status = 200, description = "Canonical images", body = [Image]),
        (status = 400, description = "Source disabled"),
        (status = 404, description = "Source not found"),
        (status = 502, description = "Upstream failure"),
        (status = 504, description = "Upstream timed out")
    )
)]
pub async fn get_images(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ImagesQuery>,
) -> Result<HttpResponse, ApiError> {
    let code = path.into_inner();
    let out = data
        .fetcher
        .fetch_by_source(&code, query.into_inner().into_fetch_query())
        .await
        .map_err(|e| {
            log::error!("fetch from source '{code}' failed: {e}");
            ApiError::from(e)
        })?;
    Ok(HttpResponse::Ok()
        .insert_header((SKIPPED_HEADER, out.skipped.to_string()))
        .json(out.images))
}
