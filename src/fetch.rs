use crate::app::ports::{HttpClientPort, TransportError};
use crate::config::FetchConfig;
use crate::constants::LOGIN_PATH_SEGMENTS;
use crate::error::FetchError;
use crate::infra::throttle::{host_of, HostThrottle};
use crate::types::RawDocument;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Retrying, politeness-aware document retrieval.
pub struct Fetcher {
    client: Arc<dyn HttpClientPort>,
    throttle: Arc<HostThrottle>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl Fetcher {
    pub fn new(
        client: Arc<dyn HttpClientPort>,
        throttle: Arc<HostThrottle>,
        config: &FetchConfig,
    ) -> Self {
        Self {
            client,
            throttle,
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base(),
        }
    }

    /// Fetch one document. 429/5xx and timeouts are retried with exponential
    /// backoff up to the attempt cap; other 4xx and login walls fail at once.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        let host = host_of(url);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.throttle.acquire(&host).await;
            ::metrics::counter!("rank_scraper_fetch_attempts_total", "host" => host.clone()).increment(1);

            let mut retry_after = None;
            let failure = match self.client.get(url).await {
                Ok(resp) => {
                    if is_login_redirect(url, &resp.final_url) {
                        ::metrics::counter!("rank_scraper_login_walls_total", "host" => host.clone())
                            .increment(1);
                        return Err(FetchError::LoginWall {
                            url: url.to_string(),
                            final_url: resp.final_url,
                        });
                    }
                    if (200..=299).contains(&resp.status) {
                        self.throttle.complete(&host).await;
                        debug!(
                            "fetched {} bytes from {} on attempt {}",
                            resp.bytes.len(),
                            url,
                            attempt
                        );
                        return Ok(RawDocument {
                            url: url.to_string(),
                            final_url: resp.final_url,
                            status: resp.status,
                            body: String::from_utf8_lossy(&resp.bytes).into_owned(),
                            fetched_at: Utc::now(),
                        });
                    }
                    let err = FetchError::Http {
                        url: url.to_string(),
                        status: resp.status,
                    };
                    if !FetchError::is_transient_status(resp.status) {
                        ::metrics::counter!("rank_scraper_fetch_failures_total", "host" => host.clone())
                            .increment(1);
                        return Err(err);
                    }
                    retry_after = resp.retry_after.map(Duration::from_secs);
                    err
                }
                Err(TransportError::Timeout) => FetchError::Timeout {
                    url: url.to_string(),
                    attempts: attempt,
                },
                Err(TransportError::Other(message)) => FetchError::Transport {
                    url: url.to_string(),
                    message,
                },
            };

            if attempt >= self.max_attempts {
                ::metrics::counter!("rank_scraper_fetch_failures_total", "host" => host.clone()).increment(1);
                warn!("giving up on {} after {} attempt(s): {}", url, attempt, failure);
                return Err(failure);
            }

            let delay = self.backoff(attempt).max(retry_after.unwrap_or(Duration::ZERO));
            ::metrics::counter!("rank_scraper_fetch_retries_total", "host" => host.clone()).increment(1);
            warn!(
                "attempt {}/{} for {} failed ({}); retrying in {:?}",
                attempt, self.max_attempts, url, failure, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// `base * 2^(attempt-1)`
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
        self.backoff_base.saturating_mul(factor)
    }
}

/// A redirect counts as a login wall when the resolved URL differs from the
/// requested one and one of its path segments names an authentication page.
pub fn is_login_redirect(requested: &str, final_url: &str) -> bool {
    if final_url.is_empty() || final_url == requested {
        return false;
    }
    let path = match reqwest::Url::parse(final_url) {
        Ok(u) => u.path().to_ascii_lowercase(),
        Err(_) => final_url.to_ascii_lowercase(),
    };
    path.split('/')
        .any(|segment| LOGIN_PATH_SEGMENTS.contains(&segment))
}
