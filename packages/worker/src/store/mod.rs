//! Persistence traits for jobs, scheduled crawls and the series catalog.
//!
//! Two backends implement all three traits with the same semantics:
//! [`MemoryStore`] for tests and development, [`SqliteStore`] for production.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use extraction::ChapterNumber;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domains::crawling::models::{Chapter, ScheduledCrawl, Series};
use crate::error::StoreResult;
use crate::kernel::jobs::{Job, JobCounts, JobFilter, JobStatus, NewJob};

/// Job rows and their state machine.
///
/// Every transition is a compare-and-set on the stored row; a caller that
/// loses the race gets `None`/`false` rather than an error.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job>;

    /// Insert unless a job with the same dedupe key exists; return the stored row.
    async fn find_or_create_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job>;

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>>;

    /// Newest first.
    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>>;

    /// Unlocked pending jobs due by `now`, oldest first.
    async fn find_due_jobs(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Job>>;

    /// `pending -> running`. Sets a fresh lock token and `started_at`.
    async fn claim_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>>;

    /// `running -> completed`, guarded on the lock token.
    async fn complete_job(
        &self,
        id: Uuid,
        lock_token: Uuid,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// `running -> failed`, guarded on the lock token.
    async fn fail_job(&self, id: Uuid, lock_token: Uuid, message: &str, now: DateTime<Utc>) -> StoreResult<bool>;

    /// `pending -> failed` with the cancel message. `None` if the job was not pending.
    async fn cancel_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>>;

    /// Fail running jobs started before `cutoff`; returns their ids.
    async fn expire_stale_jobs(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;

    /// Delete terminal jobs in `status` completed before `before`.
    async fn purge_jobs(&self, status: JobStatus, before: DateTime<Utc>) -> StoreResult<u64>;

    async fn job_counts(&self) -> StoreResult<JobCounts>;
}

#[async_trait]
pub trait ScheduledCrawlStore: Send + Sync {
    async fn insert_scheduled_crawl(&self, crawl: &ScheduledCrawl) -> StoreResult<()>;

    /// Replace the stored row. Errors with `NotFound` if it does not exist.
    async fn update_scheduled_crawl(&self, crawl: &ScheduledCrawl) -> StoreResult<()>;

    async fn get_scheduled_crawl(&self, id: Uuid) -> StoreResult<Option<ScheduledCrawl>>;

    async fn list_scheduled_crawls(&self) -> StoreResult<Vec<ScheduledCrawl>>;

    /// Returns whether a row was deleted.
    async fn delete_scheduled_crawl(&self, id: Uuid) -> StoreResult<bool>;

    /// Active crawls with `next_run_at <= now`, soonest first.
    async fn find_due_scheduled_crawls(&self, now: DateTime<Utc>) -> StoreResult<Vec<ScheduledCrawl>>;

    /// Take a due crawl for one run by moving `next_run_at` from `expected` to
    /// `next_run_at`. Only succeeds while the crawl is active and still due at
    /// `expected`, so concurrent checks run it at most once.
    async fn advance_scheduled_crawl(
        &self,
        id: Uuid,
        expected: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Stamp a run. `next_run_at` is left alone when `None`.
    async fn record_scheduled_crawl_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;
}

/// Series and chapters.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_series(&self, id: Uuid) -> StoreResult<Option<Series>>;

    /// Case-insensitive title lookup.
    async fn find_series_by_title(&self, title: &str) -> StoreResult<Option<Series>>;

    /// Return the series with the same title (case-insensitive) or store `series`.
    async fn find_or_create_series(&self, series: Series) -> StoreResult<Series>;

    async fn chapter_numbers(&self, series_id: Uuid) -> StoreResult<BTreeSet<ChapterNumber>>;

    /// Insert all chapters or none.
    async fn insert_chapters(&self, chapters: &[Chapter]) -> StoreResult<()>;

    /// Ascending by number.
    async fn list_chapters(&self, series_id: Uuid) -> StoreResult<Vec<Chapter>>;
}
