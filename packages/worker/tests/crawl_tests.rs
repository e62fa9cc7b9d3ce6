//! End-to-end crawl runs through scheduled crawls and the recurring check.

mod common;

use crate::common::*;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use extraction::{ChapterNumber, MockFetcher};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_context::test_context;
use uuid::Uuid;
use worker_core::domains::crawling::actions::DueCrawlReport;
use worker_core::domains::crawling::executor::CrawlRequest;
use worker_core::domains::crawling::models::{
    Chapter, ChapterRange, MaxChapters, NewScheduledCrawl, ScheduledCrawl, Series,
};
use worker_core::domains::crawling::{CrawlExecutor, CrawlReport, ExecutorConfig, OutcomeStatus};
use worker_core::error::{OperatorError, StoreError, StoreResult, ValidationError};
use worker_core::kernel::jobs::JobStatus;
use worker_core::store::{CatalogStore, MemoryStore, ScheduledCrawlStore};

// =============================================================================
// Test Helpers
// =============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// Run the recurring check for one due crawl and return its report.
async fn run_once(ctx: &TestHarness, crawl: &ScheduledCrawl, at: DateTime<Utc>) -> CrawlReport {
    let mut stored = ctx.scheduled_crawl(crawl.id).await;
    stored.next_run_at = at - chrono::Duration::minutes(1);
    ctx.store
        .update_scheduled_crawl(&stored)
        .await
        .expect("Failed to make crawl due");

    let job_id = ctx
        .loops
        .materialize(at)
        .await
        .unwrap()
        .expect("recurring check should run");
    let job = ctx.job(job_id).await;
    assert_eq!(job.status, JobStatus::Completed, "job failed: {:?}", job.error_message);

    let due: DueCrawlReport = job.typed_result().unwrap().unwrap();
    assert_eq!(due.runs.len(), 1);
    due.runs.into_iter().next().unwrap().report
}

fn statuses(report: &CrawlReport) -> Vec<(u32, OutcomeStatus)> {
    report
        .outcomes
        .iter()
        .map(|o| (o.chapter.unwrap().to_string().parse().unwrap(), o.status))
        .collect()
}

async fn stored_numbers(ctx: &TestHarness, series_id: Uuid) -> Vec<String> {
    ctx.store
        .list_chapters(series_id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.number.to_string())
        .collect()
}

// =============================================================================
// Auto-advance
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn auto_advance_picks_up_new_chapters(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[5, 4, 3, 2, 1]);
    let crawl = ctx.insert_due_crawl(scheduled(auto_advance_crawl()), now()).await;

    let first = run_once(ctx, &crawl, now()).await;
    use OutcomeStatus::*;
    assert_eq!(
        statuses(&first),
        vec![(1, Success), (2, Success), (3, Success), (4, Success), (5, Success)]
    );
    assert_eq!(first.series_title.as_deref(), Some(SERIES_TITLE));

    serve_series(&ctx.fetcher, &[7, 6, 5, 4, 3, 2, 1]);
    ctx.fetcher.reset_calls();
    let later = now() + chrono::Duration::hours(7);
    let second = run_once(ctx, &crawl, later).await;

    assert_eq!(
        statuses(&second),
        vec![
            (1, Skipped),
            (2, Skipped),
            (3, Skipped),
            (4, Skipped),
            (5, Skipped),
            (6, Success),
            (7, Success)
        ]
    );
    assert_eq!(second.total_skipped, 5);
    assert_eq!(second.total_crawled, 2);
    assert_eq!(second.outcomes[0].message, "chapter 1 already exists");

    // Index plus the two new chapters; known chapters are never fetched
    assert_eq!(ctx.fetcher.call_count(), 3);

    let series_id = second.series_id.unwrap();
    assert_eq!(stored_numbers(ctx, series_id).await, ["1", "2", "3", "4", "5", "6", "7"]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn chapters_store_page_images(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[1]);
    let crawl = ctx.insert_due_crawl(scheduled(auto_advance_crawl()), now()).await;

    let report = run_once(ctx, &crawl, now()).await;
    assert_eq!(report.outcomes[0].item_count, Some(3));

    let chapters = ctx.store.list_chapters(report.series_id.unwrap()).await.unwrap();
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0].source_url, chapter_url(1));
    assert_eq!(chapters[0].content.item_count(), 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn series_is_matched_by_title(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[2, 1]);
    let info = extraction::SeriesInfo {
        title: SERIES_TITLE.to_uppercase(),
        ..Default::default()
    };
    let existing = ctx
        .store
        .find_or_create_series(Series::from_info(&info, SERIES_URL, now()))
        .await
        .unwrap();

    let crawl = ctx.insert_due_crawl(scheduled(auto_advance_crawl()), now()).await;
    let report = run_once(ctx, &crawl, now()).await;

    assert_eq!(report.series_id, Some(existing.id));
}

// =============================================================================
// Range and Latest
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn range_selects_chapters_inside_bounds(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[5, 4, 3, 2, 1]);
    let crawl = ctx.insert_due_crawl(scheduled(range_crawl(3, 10, 10)), now()).await;

    let report = run_once(ctx, &crawl, now()).await;

    use OutcomeStatus::*;
    assert_eq!(statuses(&report), vec![(3, Success), (4, Success), (5, Success)]);
    assert_eq!(report.total_discovered, 5);
    assert_eq!(report.total_selected, 3);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn empty_range_writes_nothing(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[5, 4, 3, 2, 1]);
    let crawl = ctx.insert_due_crawl(scheduled(range_crawl(20, 30, 10)), now()).await;

    let report = run_once(ctx, &crawl, now()).await;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Error);
    assert_eq!(report.crawl_error(), Some("no chapters found in range 20–30"));

    let series = ctx.store.find_series_by_title(SERIES_TITLE).await.unwrap();
    if let Some(series) = series {
        assert!(stored_numbers(ctx, series.id).await.is_empty());
    }
    // Index page only
    assert_eq!(ctx.fetcher.call_count(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn latest_takes_newest_chapters(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[5, 4, 3, 2, 1]);
    let crawl = ctx.insert_due_crawl(scheduled(latest_crawl(2)), now()).await;

    let report = run_once(ctx, &crawl, now()).await;

    use OutcomeStatus::*;
    assert_eq!(statuses(&report), vec![(4, Success), (5, Success)]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn range_with_all_chapters_is_rejected(ctx: &TestHarness) {
    let new = NewScheduledCrawl {
        max_chapters: Some(MaxChapters::All),
        chapter_range: Some(ChapterRange::between(1, 10)),
        ..latest_crawl(1)
    };

    let err = ctx.operator.create_scheduled_crawl(new).await.unwrap_err();
    assert!(matches!(
        err,
        OperatorError::Validation(ValidationError::RangeWithoutLimit)
    ));
    assert!(ctx.operator.list_scheduled_crawls().await.unwrap().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn failing_chapter_is_reported_and_retried_next_run(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[3, 2, 1]);
    ctx.fetcher.add_failure(chapter_url(2));
    let crawl = ctx.insert_due_crawl(scheduled(latest_crawl(3)), now()).await;

    let first = run_once(ctx, &crawl, now()).await;
    use OutcomeStatus::*;
    assert_eq!(statuses(&first), vec![(1, Success), (2, Error), (3, Success)]);
    assert_eq!(first.total_errors, 1);

    ctx.fetcher.clear_failure(&chapter_url(2));
    let second = run_once(ctx, &crawl, now() + chrono::Duration::hours(7)).await;
    assert_eq!(statuses(&second), vec![(1, Skipped), (2, Success), (3, Skipped)]);
    assert_eq!(stored_numbers(ctx, second.series_id.unwrap()).await, ["1", "2", "3"]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn auto_advance_leaves_gaps_below_the_newest_chapter(ctx: &TestHarness) {
    serve_series(&ctx.fetcher, &[3, 2, 1]);
    ctx.fetcher.add_failure(chapter_url(2));
    let crawl = ctx.insert_due_crawl(scheduled(auto_advance_crawl()), now()).await;

    let first = run_once(ctx, &crawl, now()).await;
    use OutcomeStatus::*;
    assert_eq!(statuses(&first), vec![(1, Success), (2, Error), (3, Success)]);

    ctx.fetcher.clear_failure(&chapter_url(2));
    ctx.fetcher.reset_calls();
    let second = run_once(ctx, &crawl, now() + chrono::Duration::hours(7)).await;

    assert_eq!(statuses(&second), vec![(1, Skipped), (3, Skipped)]);
    assert_eq!(ctx.fetcher.calls_for(&chapter_url(2)), 0);
    assert_eq!(stored_numbers(ctx, second.series_id.unwrap()).await, ["1", "3"]);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unreachable_index_still_reschedules(ctx: &TestHarness) {
    let crawl = ctx.insert_due_crawl(scheduled(auto_advance_crawl()), now()).await;

    let report = run_once(ctx, &crawl, now()).await;
    assert!(report.crawl_error().is_some());

    let stored = ctx.scheduled_crawl(crawl.id).await;
    assert_eq!(stored.last_run_at, Some(now()));
    assert_eq!(stored.next_run_at, now() + chrono::Duration::hours(6));
}

/// Catalog whose first `insert_chapters` call fails.
struct FlakyCatalog {
    inner: MemoryStore,
    inserts: AtomicUsize,
}

#[async_trait]
impl CatalogStore for FlakyCatalog {
    async fn get_series(&self, id: Uuid) -> StoreResult<Option<Series>> {
        self.inner.get_series(id).await
    }

    async fn find_series_by_title(&self, title: &str) -> StoreResult<Option<Series>> {
        self.inner.find_series_by_title(title).await
    }

    async fn find_or_create_series(&self, series: Series) -> StoreResult<Series> {
        self.inner.find_or_create_series(series).await
    }

    async fn chapter_numbers(&self, series_id: Uuid) -> StoreResult<BTreeSet<ChapterNumber>> {
        self.inner.chapter_numbers(series_id).await
    }

    async fn insert_chapters(&self, chapters: &[Chapter]) -> StoreResult<()> {
        if self.inserts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(StoreError::Corrupt {
                table: "chapters",
                reason: "disk full".to_string(),
            });
        }
        self.inner.insert_chapters(chapters).await
    }

    async fn list_chapters(&self, series_id: Uuid) -> StoreResult<Vec<Chapter>> {
        self.inner.list_chapters(series_id).await
    }
}

#[tokio::test]
async fn failed_batch_halts_the_run_until_the_next_one() {
    let fetcher = MockFetcher::new();
    serve_series(&fetcher, &[4, 3, 2, 1]);
    let catalog = Arc::new(FlakyCatalog {
        inner: MemoryStore::new(),
        inserts: AtomicUsize::new(0),
    });
    let executor = CrawlExecutor::new(
        Arc::new(fetcher.clone()),
        catalog.clone(),
        ExecutorConfig::default().with_batch_size(2),
    );
    let request = CrawlRequest::from_scheduled(&scheduled(auto_advance_crawl()));

    let first = executor.execute(&request).await;

    use OutcomeStatus::*;
    assert_eq!(
        statuses(&first),
        vec![(1, Error), (2, Error), (3, Error), (4, Error)]
    );
    assert_eq!(first.total_errors, 4);
    assert!(first.outcomes[0].message.starts_with("batch insert failed: "));
    assert!(first.outcomes[1].message.contains("disk full"));
    assert!(first.outcomes[2].message.starts_with("not attempted"));
    assert_eq!(fetcher.calls_for(&chapter_url(3)), 0);
    assert_eq!(fetcher.calls_for(&chapter_url(4)), 0);

    let series_id = first.series_id.unwrap();
    assert!(catalog.list_chapters(series_id).await.unwrap().is_empty());

    // Nothing above the lost batch was stored, so auto-advance still sees it
    let second = executor.execute(&request).await;
    assert_eq!(
        statuses(&second),
        vec![(1, Success), (2, Success), (3, Success), (4, Success)]
    );

    let numbers: Vec<String> = catalog
        .list_chapters(series_id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.number.to_string())
        .collect();
    assert_eq!(numbers, ["1", "2", "3", "4"]);
}
