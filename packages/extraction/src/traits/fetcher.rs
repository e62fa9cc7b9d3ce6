//! Fetcher trait for retrieving raw HTML.
//!
//! # Usage
//!
//! ```rust,ignore
//! use extraction::traits::fetcher::PageFetcher;
//!
//! let html = fetcher.fetch("https://example.com/series/foo").await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::FetchResult;

/// Retrieves the body of a page as text.
///
/// Implementations own their retry policy; a returned error means the
/// caller should give up on this URL for the current run.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return the response body.
    async fn fetch(&self, url: &str) -> FetchResult<String>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        (**self).fetch(url).await
    }
}
