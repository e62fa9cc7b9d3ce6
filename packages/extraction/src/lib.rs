//! Page Fetching and Chapter Extraction Library
//!
//! Fetches series index pages and chapter pages from serialized-content
//! sites and turns them into structured data: series metadata, the chapter
//! list (newest first), and chapter images or cleaned text.
//!
//! # Usage
//!
//! ```rust,ignore
//! use extraction::{FetchConfig, PageFetcher, SiteKind};
//! use extraction::ingestors::HttpFetcher;
//!
//! let fetcher = HttpFetcher::new(FetchConfig::default())?;
//! let html = fetcher.fetch(url).await?;
//!
//! let site = SiteKind::from_url(url);
//! let info = site.extract_series_info(&html, url)?;
//! let chapters = site.extract_chapter_list(&html, url)?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - The `PageFetcher` abstraction
//! - [`ingestors`] - HTTP fetcher with header rotation and retry
//! - [`sites`] - Closed set of site strategies (`SiteKind`)
//! - [`cleaning`] - Chapter text cleaning
//! - [`types`] - Chapter numbers, series metadata, fetch configuration
//! - [`testing`] - Mock fetcher for tests

pub mod cleaning;
pub mod error;
pub mod ingestors;
pub mod sites;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use cleaning::clean_chapter_text;
pub use error::{ExtractError, ExtractResult, FetchError, FetchResult};
pub use ingestors::HttpFetcher;
pub use sites::SiteKind;
pub use testing::MockFetcher;
pub use traits::fetcher::PageFetcher;
pub use types::{
    chapter::{ChapterContent, ChapterLink, ChapterNumber},
    config::FetchConfig,
    series::{SeriesInfo, SeriesStatus},
};
