use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Per-host politeness limiter shared by every worker of a run.
///
/// Each host has a "next allowed" instant. `acquire` waits until that instant
/// and re-checks it after waking, so a delay scheduled by another worker's
/// `complete` in the meantime is honored. Once through, the caller holds the
/// slot for `min_delay`; `complete` pushes the slot out by a random delay drawn
/// from the configured window after a fetch has succeeded.
#[derive(Debug)]
pub struct HostThrottle {
    min_delay: Duration,
    max_delay: Duration,
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            next_allowed: Mutex::new(HashMap::new()),
        }
    }

    /// No delays at all; used by tests and one-off diagnostics.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub async fn acquire(&self, host: &str) {
        loop {
            let wait_until = {
                let mut guard = self.next_allowed.lock().await;
                let now = Instant::now();
                match guard.get(host).copied().filter(|t| *t > now) {
                    Some(slot) => slot,
                    None => {
                        guard.insert(host.to_string(), now + self.min_delay);
                        return;
                    }
                }
            };
            tokio::time::sleep_until(wait_until).await;
        }
    }

    pub async fn complete(&self, host: &str) {
        let delay = self.random_delay();
        let mut guard = self.next_allowed.lock().await;
        let candidate = Instant::now() + delay;
        let slot = guard.entry(host.to_string()).or_insert(candidate);
        if *slot < candidate {
            *slot = candidate;
        }
    }

    fn random_delay(&self) -> Duration {
        if self.max_delay.is_zero() {
            return Duration::ZERO;
        }
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Host component of a URL, empty when the URL does not parse.
pub fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}
