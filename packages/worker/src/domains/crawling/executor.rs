//! Crawl executor: index page to stored chapters.

use extraction::{
    ChapterContent, ChapterLink, ChapterNumber, ExtractError, FetchError, PageFetcher, SeriesInfo,
    SiteKind,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{Chapter, DelayRange, ScheduledCrawl, Series};
use super::outcome::{CrawlOutcome, CrawlReport};
use super::planner::{plan_chapters, CrawlScope, PlanError};
use crate::common::time::utc_now;
use crate::error::StoreError;
use crate::store::CatalogStore;

const NOT_ATTEMPTED: &str = "not attempted: an earlier batch insert failed";

/// Failures that abort a whole run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("series not found: {0}")]
    SeriesNotFound(Uuid),
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Chapters written per insert
    pub batch_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

impl ExecutorConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// One crawl of one source.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub source_url: String,
    pub series_id: Option<Uuid>,
    pub scope: CrawlScope,
    pub request_delay: DelayRange,
}

impl CrawlRequest {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            series_id: None,
            scope: CrawlScope::default(),
            request_delay: DelayRange::default(),
        }
    }

    pub fn from_scheduled(crawl: &ScheduledCrawl) -> Self {
        Self {
            source_url: crawl.source_url.clone(),
            series_id: crawl.series_id,
            scope: crawl.scope(),
            request_delay: crawl.request_delay,
        }
    }

    pub fn with_scope(mut self, scope: CrawlScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_series(mut self, series_id: Uuid) -> Self {
        self.series_id = Some(series_id);
        self
    }

    pub fn with_request_delay(mut self, request_delay: DelayRange) -> Self {
        self.request_delay = request_delay;
        self
    }
}

/// Chapters waiting to be written, with the index of their provisional outcome.
struct StagedBatch {
    entries: Vec<(usize, Chapter)>,
    capacity: usize,
}

impl StagedBatch {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, outcome_index: usize, chapter: Chapter) {
        self.entries.push((outcome_index, chapter));
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    fn take(&mut self) -> (Vec<usize>, Vec<Chapter>) {
        self.entries.drain(..).unzip()
    }
}

pub struct CrawlExecutor {
    fetcher: Arc<dyn PageFetcher>,
    catalog: Arc<dyn CatalogStore>,
    config: ExecutorConfig,
}

impl CrawlExecutor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, catalog: Arc<dyn CatalogStore>, config: ExecutorConfig) -> Self {
        Self {
            fetcher,
            catalog,
            config,
        }
    }

    /// Run one crawl. Never fails: a run that cannot start is reported as a
    /// single crawl-level error outcome.
    pub async fn execute(&self, request: &CrawlRequest) -> CrawlReport {
        match self.run(request).await {
            Ok(report) => {
                info!(
                    url = %request.source_url,
                    crawled = report.total_crawled,
                    skipped = report.total_skipped,
                    errors = report.total_errors,
                    "Crawl finished"
                );
                report
            }
            Err(e) => {
                warn!(url = %request.source_url, error = %e, "Crawl aborted");
                CrawlReport::failed(&request.source_url, e.to_string())
            }
        }
    }

    async fn run(&self, request: &CrawlRequest) -> Result<CrawlReport, CrawlError> {
        let source_url = request.source_url.as_str();
        let site = SiteKind::from_url(source_url);
        debug!(url = %source_url, site = %site, "Fetching index page");

        let html = self.fetcher.fetch(source_url).await?;
        let info = site.extract_series_info(&html, source_url)?;
        let discovered = site.extract_chapter_list(&html, source_url)?;
        drop(html);

        let series = self.resolve_series(request, &info).await?;
        let mut known = self.catalog.chapter_numbers(series.id).await?;
        let plan = plan_chapters(&discovered, &known, &request.scope)?;

        debug!(
            series = %series.title,
            discovered = discovered.len(),
            selected = plan.len(),
            known = known.len(),
            "Planned crawl"
        );

        let mut report = CrawlReport {
            series_id: Some(series.id),
            series_title: Some(series.title.clone()),
            total_discovered: discovered.len(),
            total_selected: plan.len(),
            ..Default::default()
        };
        let mut staged = StagedBatch::new(self.config.batch_size.max(1));
        let mut halted = false;

        for link in &plan {
            if known.contains(&link.number) {
                report.outcomes.push(CrawlOutcome::skipped(link.number, &link.url));
                continue;
            }

            // Nothing above a lost batch may be stored
            if halted {
                report
                    .outcomes
                    .push(CrawlOutcome::error(link.number, &link.url, NOT_ATTEMPTED));
                continue;
            }

            let delay = request.request_delay.sample();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.fetch_chapter(site, link).await {
                Ok(content) => {
                    let item_count = content.item_count();
                    let chapter = Chapter::new(series.id, link.number, &link.title, &link.url, content, utc_now());

                    report
                        .outcomes
                        .push(CrawlOutcome::success(link.number, &link.url, chapter.id, item_count));
                    known.insert(link.number);
                    staged.push(report.outcomes.len() - 1, chapter);

                    if staged.is_full() && !self.flush(&mut staged, &mut report, &mut known).await {
                        halted = true;
                    }
                }
                Err(e) => {
                    warn!(url = %link.url, chapter = %link.number, error = %e, "Chapter failed");
                    report
                        .outcomes
                        .push(CrawlOutcome::error(link.number, &link.url, e.to_string()));
                }
            }
        }

        self.flush(&mut staged, &mut report, &mut known).await;
        report.tally();
        Ok(report)
    }

    async fn resolve_series(&self, request: &CrawlRequest, info: &SeriesInfo) -> Result<Series, CrawlError> {
        if let Some(id) = request.series_id {
            return self
                .catalog
                .get_series(id)
                .await?
                .ok_or(CrawlError::SeriesNotFound(id));
        }

        if let Some(existing) = self.catalog.find_series_by_title(&info.title).await? {
            return Ok(existing);
        }

        let series = self
            .catalog
            .find_or_create_series(Series::from_info(info, &request.source_url, utc_now()))
            .await?;
        info!(series_id = %series.id, title = %series.title, "Created series");
        Ok(series)
    }

    async fn fetch_chapter(&self, site: SiteKind, link: &ChapterLink) -> Result<ChapterContent, CrawlError> {
        let html = self.fetcher.fetch(&link.url).await?;
        Ok(site.extract_chapter_content(&html, &link.url)?)
    }

    /// Write the staged chapters. On failure their outcomes turn into errors
    /// and their numbers leave the known set. Returns whether the batch landed.
    async fn flush(&self, staged: &mut StagedBatch, report: &mut CrawlReport, known: &mut BTreeSet<ChapterNumber>) -> bool {
        let (indices, chapters) = staged.take();
        if chapters.is_empty() {
            return true;
        }

        match self.catalog.insert_chapters(&chapters).await {
            Ok(()) => {
                debug!(count = chapters.len(), "Saved chapter batch");
                true
            }
            Err(e) => {
                warn!(count = chapters.len(), error = %e, "Chapter batch failed, halting run");
                let message = format!("batch insert failed: {}", e);
                for (index, chapter) in indices.into_iter().zip(&chapters) {
                    report.outcomes[index] = CrawlOutcome::error(chapter.number, &chapter.source_url, message.clone());
                    known.remove(&chapter.number);
                }
                false
            }
        }
    }
}
