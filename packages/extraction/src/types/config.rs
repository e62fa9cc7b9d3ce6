//! Fetcher configuration.

use std::time::Duration;

/// Configuration for [`crate::ingestors::HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Time allowed to establish the TCP/TLS connection
    pub connect_timeout: Duration,

    /// Time allowed between body reads once connected
    pub read_timeout: Duration,

    /// Total attempts per URL, including the first
    pub max_attempts: u32,

    /// Backoff grows linearly: `base_delay * attempt`
    pub base_delay: Duration,

    /// Upper bound of the random jitter added to each backoff
    pub jitter: Duration,

    /// Value sent as `Accept-Language`
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(1000),
            accept_language: "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the attempt budget. Values below 1 are treated as 1.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, base_delay: Duration, jitter: Duration) -> Self {
        self.base_delay = base_delay;
        self.jitter = jitter;
        self
    }

    pub fn with_accept_language(mut self, value: impl Into<String>) -> Self {
        self.accept_language = value.into();
        self
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(..jitter_ms))
        };
        self.base_delay * attempt + jitter
    }
}
