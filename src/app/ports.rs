use async_trait::async_trait;
use thiserror::Error;

/// Transport seam for document retrieval. The fetcher owns retry and
/// politeness policy; implementations perform exactly one GET.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult, TransportError>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    /// URL after redirects were followed.
    pub final_url: String,
    pub bytes: Vec<u8>,
    /// `Retry-After` in seconds, when the server sent one.
    pub retry_after: Option<u64>,
}

#[derive(Error, Clone, Debug, PartialEq)]
pub enum TransportError {
    #[error("timed out")]
    Timeout,
    #[error("{0}")]
    Other(String),
}
