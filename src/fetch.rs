use std::sync::Arc;

use tracing::{field, info, instrument, warn};

use crate::error::FetchError;
use crate::mapper::{decode, ImageMapper};
use crate::models::{Image, SourceCode};
use crate::repo::{RepoError, SourceRepo};
use crate::request::{build_request, Pagination};
use crate::telemetry;
use crate::upstream::UpstreamClient;

/// Caller-side parameters of one fetch. `page`/`limit` <= 0 mean "use defaults".
#[derive(Debug, Clone, Default)]
pub struct FetchQuery {
    pub tags: Vec<String>,
    pub page: i64,
    pub limit: i64,
    pub raw: bool,
}

#[derive(Debug, Default)]
pub struct FetchedImages {
    pub images: Vec<Image>,
    /// Upstream records dropped for lacking `id` or `file_url`.
    pub skipped: usize,
}

/// Loads a source, performs exactly one upstream call and normalizes the result.
#[derive(Clone)]
pub struct SourceFetcher {
    repo: Arc<dyn SourceRepo>,
    upstream: Arc<dyn UpstreamClient>,
}

impl SourceFetcher {
    pub fn new(repo: Arc<dyn SourceRepo>, upstream: Arc<dyn UpstreamClient>) -> Self {
        Self { repo, upstream }
    }

    pub async fn fetch_by_source(&self, code: &str, query: FetchQuery) -> Result<FetchedImages, FetchError> {
        let code = code.trim();
        if code.is_empty() {
            telemetry::record_fetch(None, FetchError::MissingCode.kind());
            return Err(FetchError::MissingCode);
        }
        let code = SourceCode::new(code);
        let res = self.fetch(&code, query).await;
        match &res {
            Ok(out) => {
                telemetry::record_fetch(Some(&code), "ok");
                telemetry::record_skipped(&code, out.skipped);
            }
            // the code never resolved to a stored source, so it must not become a label
            Err(e @ (FetchError::SourceNotFound | FetchError::Repo(_))) => telemetry::record_fetch(None, e.kind()),
            Err(e) => telemetry::record_fetch(Some(&code), e.kind()),
        }
        res
    }

    #[instrument(skip_all, fields(source = %code, page = field::Empty, limit = field::Empty))]
    async fn fetch(&self, code: &SourceCode, query: FetchQuery) -> Result<FetchedImages, FetchError> {
        let source = self.repo.get_source_by_code(code).await.map_err(|e| match e {
            RepoError::NotFound => FetchError::SourceNotFound,
            other => FetchError::Repo(other),
        })?;
        if !source.enabled {
            return Err(FetchError::SourceDisabled);
        }
        let mapper = ImageMapper::new(&source)?;

        let pagination = Pagination::resolve(query.page, query.limit, source.defaults.max_limit());
        let span = tracing::Span::current();
        span.record("page", pagination.page);
        span.record("limit", pagination.limit);

        let req = build_request(&source, &query.tags, pagination, query.raw);
        let body = self.upstream.execute(&req).await.map_err(|e| {
            warn!(url = %req.url, "upstream call failed: {e}");
            e
        })?;
        let records = decode(&body)?;
        let batch = mapper.map_all(&records);
        if batch.skipped > 0 {
            warn!(skipped = batch.skipped, total = records.len(), "dropped upstream records missing id/file_url");
        }
        info!(images = batch.images.len(), "fetched images");
        Ok(FetchedImages { images: batch.images, skipped: batch.skipped })
    }
}
