use std::collections::BTreeMap;
use std::time::Duration;

use crate::models::Source;

/// Page and limit after clamping against the source's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// `page <= 0` becomes 1; `limit` outside `1..=max_limit` becomes `max_limit`.
    pub fn resolve(page: i64, limit: i64, max_limit: u32) -> Self {
        let page = if page <= 0 { 1 } else { u32::try_from(page).unwrap_or(u32::MAX) };
        let limit = if limit <= 0 || limit > i64::from(max_limit) { max_limit } else { limit as u32 };
        Self { page, limit }
    }
}

/// Everything the upstream client needs to perform one GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

pub fn posts_url(base_url: &str, posts_path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), posts_path.trim_start_matches('/'))
}

/// Build the outbound request for `source`.
///
/// Tag, limit and page parameters are only attached when `tags` is non-empty;
/// a tag-less call sends the source's static `extra_query` alone. Unless `raw`
/// is set, the configured tag suffix is appended to the tag query.
pub fn build_request(source: &Source, tags: &[String], pagination: Pagination, raw: bool) -> UpstreamRequest {
    let req = &source.request;
    let mut query = req.extra_query.clone();

    if !tags.is_empty() {
        let mut tag_query = tags.join(" ");
        if !raw {
            if let Some(suffix) = source.defaults.tags_suffix.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                tag_query.push(' ');
                tag_query.push_str(suffix);
            }
        }
        query.insert(req.tags_param.clone(), tag_query);
        query.insert(req.limit_param.clone(), pagination.limit.to_string());
        query.insert(req.page_param.clone(), pagination.page.to_string());
    }

    UpstreamRequest {
        url: posts_url(&source.base_url, &req.posts_path),
        query,
        headers: req.headers.clone(),
        timeout: source.defaults.timeout(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use chrono::Utc;

    fn source() -> Source {
        let mut request = RequestConfig {
            posts_path: "/posts.json".into(),
            tags_param: "tags".into(),
            limit_param: "limit".into(),
            page_param: "page".into(),
            ..Default::default()
        };
        request.extra_query.insert("api_version".into(), "2".into());
        request.headers.insert("User-Agent".into(), "boorumesh/1.0".into());
        Source {
            id: 1,
            code: SourceCode::new("dan"),
            name: "Danbooru".into(),
            base_url: "https://example.org/".into(),
            enabled: true,
            request,
            mapping: SourceMapping::default(),
            defaults: SourceDefaults { tags_suffix: Some("rating:g".into()), max_limit: 50, timeout_ms: 1200 },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pagination_clamps() {
        assert_eq!(Pagination::resolve(0, 0, 100), Pagination { page: 1, limit: 100 });
        assert_eq!(Pagination::resolve(-3, 500, 100), Pagination { page: 1, limit: 100 });
        assert_eq!(Pagination::resolve(4, 20, 100), Pagination { page: 4, limit: 20 });
        assert_eq!(Pagination::resolve(2, 100, 100), Pagination { page: 2, limit: 100 });
    }

    #[test]
    fn joins_url_with_one_slash() {
        assert_eq!(posts_url("https://a.b/", "/posts.json"), "https://a.b/posts.json");
        assert_eq!(posts_url("https://a.b", "posts.json"), "https://a.b/posts.json");
        assert_eq!(posts_url("https://a.b//", "//index.php"), "https://a.b/index.php");
    }

    #[test]
    fn tagless_request_sends_extra_query_only() {
        let r = build_request(&source(), &[], Pagination { page: 2, limit: 10 }, false);
        assert_eq!(r.url, "https://example.org/posts.json");
        assert_eq!(r.query.len(), 1);
        assert_eq!(r.query["api_version"], "2");
        assert_eq!(r.headers["User-Agent"], "boorumesh/1.0");
        assert_eq!(r.timeout, Duration::from_millis(1200));
    }

    #[test]
    fn tagged_request_carries_suffix_unless_raw() {
        let tags = vec!["cat_ears".to_string(), "solo".to_string()];
        let r = build_request(&source(), &tags, Pagination { page: 3, limit: 25 }, false);
        assert_eq!(r.query["tags"], "cat_ears solo rating:g");
        assert_eq!(r.query["limit"], "25");
        assert_eq!(r.query["page"], "3");
        assert_eq!(r.query["api_version"], "2");

        let r = build_request(&source(), &tags, Pagination { page: 3, limit: 25 }, true);
        assert_eq!(r.query["tags"], "cat_ears solo");
    }

    #[test]
    fn builder_params_override_extra_query() {
        let mut src = source();
        src.request.extra_query.insert("limit".into(), "999".into());
        let r = build_request(&src, &["a".to_string()], Pagination { page: 1, limit: 5 }, true);
        assert_eq!(r.query["limit"], "5");
    }
}
