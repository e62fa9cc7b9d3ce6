//! HTTP-based page fetcher.
//!
//! Sends browser-like headers with a rotating user agent and retries
//! transient failures with linear backoff plus jitter.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONNECTION, REFERER, USER_AGENT};
use tracing::{debug, warn};
use url::Url;

use super::user_agent::random_user_agent;
use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::PageFetcher;
use crate::types::config::FetchConfig;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// HTTP fetcher for series and chapter pages.
///
/// # Example
///
/// ```rust,ignore
/// use extraction::ingestors::HttpFetcher;
/// use extraction::FetchConfig;
///
/// let fetcher = HttpFetcher::new(FetchConfig::default().with_max_attempts(5))?;
/// let html = fetcher.fetch("https://truyenvn.example/truyen/foo").await?;
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Build a fetcher with its own connection pool.
    pub fn new(config: FetchConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client, config })
    }

    /// Set a custom HTTP client. Timeouts configured on it take precedence.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_once(&self, url: &Url, referer: &str) -> FetchResult<String> {
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, random_user_agent())
            .header(REFERER, referer)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, self.config.accept_language.as_str())
            .header(CONNECTION, "keep-alive")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        let parsed = parse_http_url(url)?;
        let referer = referer_for(&parsed);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            debug!(url = %parsed, attempt, "HTTP fetch starting");

            match self.fetch_once(&parsed, &referer).await {
                Ok(body) => {
                    debug!(url = %parsed, attempt, bytes = body.len(), "HTTP fetch complete");
                    return Ok(body);
                }
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        url = %parsed,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "HTTP fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(url = %parsed, attempt, error = %e, "HTTP fetch failed, giving up");
                    return Err(FetchError::Exhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
            }
        }
    }
}

fn parse_http_url(url: &str) -> FetchResult<Url> {
    let invalid = || FetchError::InvalidUrl {
        url: url.to_string(),
    };

    let parsed = Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(parsed)
}

/// `scheme://host[:port]/` of the target, which is what a browser sends
/// when navigating within a site.
pub(crate) fn referer_for(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}://{}:{}/", url.scheme(), host, port),
        (Some(host), None) => format!("{}://{}/", url.scheme(), host),
        _ => String::new(),
    }
}
