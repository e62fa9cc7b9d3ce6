//! Site-specific extraction strategies.
//!
//! The set of supported sources is closed: [`SiteKind`] is resolved once
//! from the URL host and every operation dispatches with an exhaustive
//! `match`. Sites without a dedicated strategy use [`SiteKind::Generic`].
//!
//! # Example
//!
//! ```rust,ignore
//! use extraction::SiteKind;
//!
//! let site = SiteKind::from_url(url);
//! let info = site.extract_series_info(&html, url)?;
//! let chapters = site.extract_chapter_list(&html, url)?; // newest first
//! ```

mod common;
mod generic;
mod nettruyen;
mod truyenfull;
mod truyenvn;

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{ExtractError, ExtractResult};
use crate::types::chapter::{ChapterContent, ChapterLink};
use crate::types::series::SeriesInfo;

/// Source family a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    /// NetTruyen mirrors (comic pages)
    NetTruyen,
    /// TruyenVN and other WordPress manga-theme sites
    TruyenVn,
    /// TruyenFull-style novel sites (text chapters)
    TruyenFull,
    /// Heuristic fallback
    Generic,
}

impl SiteKind {
    /// Resolve the strategy for `url` from its host. Unparseable URLs map
    /// to [`SiteKind::Generic`].
    pub fn from_url(url: &str) -> Self {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_default();

        if host.contains("nettruyen") {
            SiteKind::NetTruyen
        } else if host.contains("truyenvn") {
            SiteKind::TruyenVn
        } else if host.contains("truyenfull") {
            SiteKind::TruyenFull
        } else {
            SiteKind::Generic
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SiteKind::NetTruyen => "nettruyen",
            SiteKind::TruyenVn => "truyenvn",
            SiteKind::TruyenFull => "truyenfull",
            SiteKind::Generic => "generic",
        }
    }

    /// Series metadata from an index page.
    pub fn extract_series_info(&self, html: &str, url: &str) -> ExtractResult<SeriesInfo> {
        let base = parse_base(url)?;
        let document = Html::parse_document(html);

        let info = match self {
            SiteKind::NetTruyen => nettruyen::series_info(&document, &base),
            SiteKind::TruyenVn => truyenvn::series_info(&document, &base),
            SiteKind::TruyenFull => truyenfull::series_info(&document, &base),
            SiteKind::Generic => generic::series_info(&document, &base),
        };

        info.ok_or_else(|| ExtractError::MissingTitle {
            url: url.to_string(),
        })
    }

    /// Chapters listed on an index page, newest first.
    ///
    /// Entries whose number cannot be recognized are dropped; each number
    /// appears once. An empty list is not an error.
    pub fn extract_chapter_list(&self, html: &str, url: &str) -> ExtractResult<Vec<ChapterLink>> {
        let base = parse_base(url)?;
        let document = Html::parse_document(html);

        let mut chapters = match self {
            SiteKind::NetTruyen => nettruyen::chapter_list(&document, &base),
            SiteKind::TruyenVn => truyenvn::chapter_list(&document, &base),
            SiteKind::TruyenFull => truyenfull::chapter_list(&document, &base),
            SiteKind::Generic => generic::chapter_list(&document, &base),
        };

        // Sites disagree on list direction; normalize to newest first.
        chapters.sort_by(|a, b| b.number.cmp(&a.number));
        Ok(chapters)
    }

    /// Images or cleaned text from a chapter page.
    pub fn extract_chapter_content(&self, html: &str, url: &str) -> ExtractResult<ChapterContent> {
        let base = parse_base(url)?;
        let document = Html::parse_document(html);

        let content = match self {
            SiteKind::NetTruyen => nettruyen::chapter_content(&document, &base),
            SiteKind::TruyenVn => truyenvn::chapter_content(&document, &base),
            SiteKind::TruyenFull => truyenfull::chapter_content(&document),
            SiteKind::Generic => generic::chapter_content(&document, &base),
        };

        content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ExtractError::NoContent {
                url: url.to_string(),
            })
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn parse_base(url: &str) -> ExtractResult<Url> {
    Url::parse(url).map_err(|_| ExtractError::InvalidUrl {
        url: url.to_string(),
    })
}
