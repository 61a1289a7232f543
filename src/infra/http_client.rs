use crate::app::ports::{HttpClientPort, HttpGetResult, TransportError};
use crate::constants::USER_AGENT;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use std::time::Duration;

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self> {
        // gzip/deflate bodies are decoded transparently with those reqwest features on
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| ScraperError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get(&self, url: &str) -> std::result::Result<HttpGetResult, TransportError> {
        tracing::debug!("HTTP GET request to: {}", url);
        let resp = self.client.get(url).send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(classify)?.to_vec();
        tracing::debug!(
            "HTTP response: status={}, size={} bytes, final_url={}",
            status,
            bytes.len(),
            final_url
        );
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        Ok(HttpGetResult {
            status,
            final_url,
            bytes,
            retry_after,
        })
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Other(e.to_string())
    }
}
