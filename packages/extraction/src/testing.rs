//! Testing utilities including a mock fetcher.
//!
//! Lets applications exercise crawl logic against canned HTML without
//! making real network calls.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::PageFetcher;

/// Mock fetcher for testing.
///
/// Serves canned pages by exact URL. Unknown URLs answer with HTTP 404 and
/// URLs marked as failing answer with HTTP 503. Every call is recorded.
///
/// # Example
///
/// ```rust
/// use extraction::testing::MockFetcher;
///
/// let fetcher = MockFetcher::new()
///     .with_page("https://example.com/series/foo", "<h1>Foo</h1>")
///     .with_failure("https://example.com/series/foo/chapter-2");
/// ```
#[derive(Default, Clone)]
pub struct MockFetcher {
    /// Canned bodies indexed by URL
    pages: Arc<RwLock<HashMap<String, String>>>,
    /// URLs that always fail
    failures: Arc<RwLock<HashSet<String>>>,
    /// Every requested URL, in order
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`, replacing any previous page.
    pub fn add_page(&self, url: impl Into<String>, body: impl Into<String>) {
        self.pages.write().unwrap().insert(url.into(), body.into());
    }

    /// Make `url` fail with a server error.
    pub fn add_failure(&self, url: impl Into<String>) {
        self.failures.write().unwrap().insert(url.into());
    }

    /// Stop failing `url`.
    pub fn clear_failure(&self, url: &str) {
        self.failures.write().unwrap().remove(url);
    }

    /// Builder-style [`MockFetcher::add_page`].
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.add_page(url, body);
        self
    }

    /// Builder-style [`MockFetcher::add_failure`].
    pub fn with_failure(self, url: impl Into<String>) -> Self {
        self.add_failure(url);
        self
    }

    /// All requested URLs in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// How many times `url` was requested.
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.read().unwrap().iter().filter(|u| *u == url).count()
    }

    /// Clear recorded calls, keeping pages and failures.
    pub fn reset_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        self.calls.write().unwrap().push(url.to_string());

        if self.failures.read().unwrap().contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }

        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}
