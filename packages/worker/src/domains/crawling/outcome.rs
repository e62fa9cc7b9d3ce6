use extraction::ChapterNumber;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Skipped,
    Error,
}

/// Result for one chapter, or for the whole source when `chapter` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub status: OutcomeStatus,
    pub chapter: Option<ChapterNumber>,
    pub url: String,
    pub message: String,
    pub chapter_id: Option<Uuid>,
    /// Image count, or character count for text chapters
    pub item_count: Option<usize>,
}

impl CrawlOutcome {
    pub fn success(chapter: ChapterNumber, url: impl Into<String>, chapter_id: Uuid, item_count: usize) -> Self {
        Self {
            status: OutcomeStatus::Success,
            chapter: Some(chapter),
            url: url.into(),
            message: format!("chapter {} saved ({} items)", chapter, item_count),
            chapter_id: Some(chapter_id),
            item_count: Some(item_count),
        }
    }

    pub fn skipped(chapter: ChapterNumber, url: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Skipped,
            chapter: Some(chapter),
            url: url.into(),
            message: format!("chapter {} already exists", chapter),
            chapter_id: None,
            item_count: None,
        }
    }

    pub fn error(chapter: ChapterNumber, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            chapter: Some(chapter),
            url: url.into(),
            message: message.into(),
            chapter_id: None,
            item_count: None,
        }
    }

    /// Failure of the run as a whole.
    pub fn crawl_error(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            chapter: None,
            url: url.into(),
            message: message.into(),
            chapter_id: None,
            item_count: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Summary of one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub series_id: Option<Uuid>,
    pub series_title: Option<String>,
    pub total_discovered: usize,
    pub total_selected: usize,
    pub total_crawled: usize,
    pub total_skipped: usize,
    pub total_errors: usize,
    pub outcomes: Vec<CrawlOutcome>,
}

impl CrawlReport {
    /// A run that aborted before any chapter was visited.
    pub fn failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        let mut report = Self::default();
        report.outcomes.push(CrawlOutcome::crawl_error(url, message));
        report.tally();
        report
    }

    /// Recompute the totals from `outcomes`.
    pub fn tally(&mut self) {
        let count = |status: OutcomeStatus| self.outcomes.iter().filter(|o| o.status == status).count();
        self.total_crawled = count(OutcomeStatus::Success);
        self.total_skipped = count(OutcomeStatus::Skipped);
        self.total_errors = count(OutcomeStatus::Error);
    }

    /// The crawl-level error message, if the run aborted.
    pub fn crawl_error(&self) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|o| o.status == OutcomeStatus::Error && o.chapter.is_none())
            .map(|o| o.message.as_str())
    }

    pub fn statuses(&self) -> Vec<(Option<ChapterNumber>, OutcomeStatus)> {
        self.outcomes.iter().map(|o| (o.chapter, o.status)).collect()
    }
}
