//! Page fetcher implementations.
//!
//! # Available Fetchers
//!
//! - `HttpFetcher` - reqwest client with rotating browser headers and retry
//! - `MockFetcher` - canned pages for tests (see [`crate::testing`])
//!
//! # Example
//!
//! ```rust,ignore
//! use extraction::ingestors::HttpFetcher;
//! use extraction::{FetchConfig, PageFetcher};
//!
//! let fetcher = HttpFetcher::new(FetchConfig::default())?;
//! let html = fetcher.fetch("https://nettruyen.example/truyen-tranh/foo").await?;
//! ```

mod http;
mod user_agent;

pub use http::HttpFetcher;
pub use user_agent::{random_user_agent, USER_AGENTS};

// Re-export from traits for convenience
pub use crate::traits::fetcher::PageFetcher;
