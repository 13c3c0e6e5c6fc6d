use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::FetchError;
use crate::request::UpstreamRequest;

/// One GET against an upstream board. Implementations never retry.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn execute(&self, req: &UpstreamRequest) -> Result<Vec<u8>, FetchError>;
}

/// `reqwest`-backed client. The inner client is shared (connection pool);
/// the deadline comes from each request.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(client: reqwest::Client) -> Self { Self { client } }

    pub fn with_connect_timeout(connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self::new(client))
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn execute(&self, req: &UpstreamRequest) -> Result<Vec<u8>, FetchError> {
        let mut builder = self.client.get(&req.url).timeout(req.timeout);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (name, value) in &req.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await.map_err(classify)?;
        let status = resp.status();
        debug!(url = %resp.url(), status = status.as_u16(), "upstream responded");
        if !status.is_success() {
            return Err(FetchError::UpstreamStatus(status.as_u16()));
        }
        let body = resp.bytes().await.map_err(classify)?;
        Ok(body.to_vec())
    }
}
