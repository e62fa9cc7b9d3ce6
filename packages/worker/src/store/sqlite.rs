//! SQLite storage implementation.
//!
//! Production backend. Timestamps are stored as fixed-width RFC 3339 text so
//! that `<`/`ORDER BY` on the column is chronological; UUIDs and JSON
//! payloads are stored as text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use extraction::{ChapterContent, ChapterNumber, SeriesStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::{CatalogStore, JobStore, ScheduledCrawlStore};
use crate::common::{format_timestamp, parse_timestamp};
use crate::domains::crawling::models::{
    title_key, Cadence, Chapter, ChapterRange, DelayRange, MaxChapters, ScheduledCrawl, Series,
};
use crate::error::{StoreError, StoreResult};
use crate::kernel::jobs::{
    Job, JobCounts, JobFilter, JobStatus, NewJob, CANCELED_MESSAGE, LOCK_EXPIRED_MESSAGE,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        job_type TEXT NOT NULL,
        status TEXT NOT NULL,
        scheduled_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT,
        options TEXT NOT NULL DEFAULT '{}',
        result TEXT,
        error_message TEXT,
        lock_token TEXT,
        retry_count INTEGER NOT NULL DEFAULT 0,
        max_retries INTEGER NOT NULL DEFAULT 3,
        parent_job_id TEXT,
        dedupe_key TEXT UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_due ON jobs(status, scheduled_at)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_parent ON jobs(parent_job_id)",
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_crawls (
        id TEXT PRIMARY KEY,
        series_id TEXT,
        source_url TEXT NOT NULL,
        cadence_type TEXT NOT NULL,
        cadence_time TEXT NOT NULL,
        cadence_days TEXT NOT NULL DEFAULT '[]',
        max_chapters TEXT,
        chapter_range_start TEXT,
        chapter_range_end TEXT,
        request_delay_min_ms INTEGER NOT NULL,
        request_delay_max_ms INTEGER NOT NULL,
        status TEXT NOT NULL,
        auto_advance INTEGER NOT NULL DEFAULT 0,
        last_run_at TEXT,
        next_run_at TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scheduled_crawls_due ON scheduled_crawls(status, next_run_at)",
    r#"
    CREATE TABLE IF NOT EXISTS series (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        title_key TEXT NOT NULL UNIQUE,
        slug TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        cover_url TEXT,
        source_url TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chapters (
        id TEXT PRIMARY KEY,
        series_id TEXT NOT NULL REFERENCES series(id) ON DELETE CASCADE,
        number TEXT NOT NULL,
        title TEXT NOT NULL,
        source_url TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (series_id, number)
    )
    "#,
];

/// SQLite-backed store for jobs, scheduled crawls and the catalog.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and create if missing) the database at `database_url`.
    ///
    /// # Example URLs
    /// - `sqlite://crawl-worker.db?mode=rwc` - File database
    /// - `sqlite::memory:` - In-memory database (see [`in_memory`](Self::in_memory))
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// In-memory database on a single long-lived connection (for tests).
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(JobRow::into_job)
            .transpose()
    }

    async fn insert_job_row(&self, job: &Job, on_conflict_ignore: bool) -> StoreResult<()> {
        let sql = if on_conflict_ignore {
            r#"
            INSERT INTO jobs (
                id, job_type, status, scheduled_at, started_at, completed_at, options, result,
                error_message, lock_token, retry_count, max_retries, parent_job_id, dedupe_key,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(dedupe_key) DO NOTHING
            "#
        } else {
            r#"
            INSERT INTO jobs (
                id, job_type, status, scheduled_at, started_at, completed_at, options, result,
                error_message, lock_token, retry_count, max_retries, parent_job_id, dedupe_key,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        };

        sqlx::query(sql)
            .bind(job.id.to_string())
            .bind(&job.job_type)
            .bind(job.status.as_str())
            .bind(format_timestamp(job.scheduled_at))
            .bind(job.started_at.map(format_timestamp))
            .bind(job.completed_at.map(format_timestamp))
            .bind(serde_json::to_string(&job.options)?)
            .bind(job.result.as_ref().map(serde_json::to_string).transpose()?)
            .bind(&job.error_message)
            .bind(job.lock_token.map(|t| t.to_string()))
            .bind(job.retry_count as i64)
            .bind(job.max_retries as i64)
            .bind(job.parent_job_id.map(|id| id.to_string()))
            .bind(&job.dedupe_key)
            .bind(format_timestamp(job.created_at))
            .bind(format_timestamp(job.updated_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_series_where(&self, column: &str, value: String) -> StoreResult<Option<Series>> {
        let sql = format!("SELECT * FROM series WHERE {} = ?", column);
        sqlx::query_as::<_, SeriesRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(SeriesRow::into_series)
            .transpose()
    }
}

// ============================================================================
// Row types
// ============================================================================

fn parse_ts(table: &'static str, raw: &str) -> StoreResult<DateTime<Utc>> {
    parse_timestamp(raw).map_err(|e| StoreError::corrupt(table, format!("bad timestamp {:?}: {}", raw, e)))
}

fn parse_opt_ts(table: &'static str, raw: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    raw.map(|r| parse_ts(table, &r)).transpose()
}

fn parse_uuid(table: &'static str, raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::corrupt(table, format!("bad uuid {:?}: {}", raw, e)))
}

fn parse_opt_uuid(table: &'static str, raw: Option<String>) -> StoreResult<Option<Uuid>> {
    raw.map(|r| parse_uuid(table, &r)).transpose()
}

fn parse_number(table: &'static str, raw: &str) -> StoreResult<ChapterNumber> {
    ChapterNumber::parse(raw).ok_or_else(|| StoreError::corrupt(table, format!("bad chapter number {:?}", raw)))
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    job_type: String,
    status: String,
    scheduled_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    options: String,
    result: Option<String>,
    error_message: Option<String>,
    lock_token: Option<String>,
    retry_count: i64,
    max_retries: i64,
    parent_job_id: Option<String>,
    dedupe_key: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn into_job(self) -> StoreResult<Job> {
        const T: &str = "jobs";
        Ok(Job {
            id: parse_uuid(T, &self.id)?,
            status: self.status.parse().map_err(|e: String| StoreError::corrupt(T, e))?,
            job_type: self.job_type,
            scheduled_at: parse_ts(T, &self.scheduled_at)?,
            started_at: parse_opt_ts(T, self.started_at)?,
            completed_at: parse_opt_ts(T, self.completed_at)?,
            options: serde_json::from_str(&self.options)?,
            result: self.result.as_deref().map(serde_json::from_str).transpose()?,
            error_message: self.error_message,
            lock_token: parse_opt_uuid(T, self.lock_token)?,
            retry_count: self.retry_count as i32,
            max_retries: self.max_retries as i32,
            parent_job_id: parse_opt_uuid(T, self.parent_job_id)?,
            dedupe_key: self.dedupe_key,
            created_at: parse_ts(T, &self.created_at)?,
            updated_at: parse_ts(T, &self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScheduledCrawlRow {
    id: String,
    series_id: Option<String>,
    source_url: String,
    cadence_type: String,
    cadence_time: String,
    cadence_days: String,
    max_chapters: Option<String>,
    chapter_range_start: Option<String>,
    chapter_range_end: Option<String>,
    request_delay_min_ms: i64,
    request_delay_max_ms: i64,
    status: String,
    auto_advance: bool,
    last_run_at: Option<String>,
    next_run_at: String,
    created_at: String,
    updated_at: String,
}

impl ScheduledCrawlRow {
    fn into_scheduled_crawl(self) -> StoreResult<ScheduledCrawl> {
        const T: &str = "scheduled_crawls";

        let days: Vec<String> = serde_json::from_str(&self.cadence_days)?;
        let cadence = Cadence::parse(&self.cadence_type, &self.cadence_time, &days)
            .map_err(|e| StoreError::corrupt(T, e))?;

        let max_chapters = self
            .max_chapters
            .as_deref()
            .map(|raw| raw.parse::<MaxChapters>().map_err(|e| StoreError::corrupt(T, e)))
            .transpose()?;

        let chapter_range = match (self.chapter_range_start, self.chapter_range_end) {
            (Some(start), Some(end)) => Some(ChapterRange::new(parse_number(T, &start)?, parse_number(T, &end)?)),
            (None, None) => None,
            _ => return Err(StoreError::corrupt(T, "chapter range has only one bound")),
        };

        Ok(ScheduledCrawl {
            id: parse_uuid(T, &self.id)?,
            series_id: parse_opt_uuid(T, self.series_id)?,
            source_url: self.source_url,
            cadence,
            max_chapters,
            chapter_range,
            request_delay: DelayRange::new(
                self.request_delay_min_ms.max(0) as u64,
                self.request_delay_max_ms.max(0) as u64,
            ),
            status: self.status.parse().map_err(|e: String| StoreError::corrupt(T, e))?,
            auto_advance: self.auto_advance,
            last_run_at: parse_opt_ts(T, self.last_run_at)?,
            next_run_at: parse_ts(T, &self.next_run_at)?,
            created_at: parse_ts(T, &self.created_at)?,
            updated_at: parse_ts(T, &self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SeriesRow {
    id: String,
    title: String,
    slug: String,
    description: Option<String>,
    status: String,
    cover_url: Option<String>,
    source_url: String,
    created_at: String,
    updated_at: String,
}

impl SeriesRow {
    fn into_series(self) -> StoreResult<Series> {
        const T: &str = "series";
        Ok(Series {
            id: parse_uuid(T, &self.id)?,
            title: self.title,
            slug: self.slug,
            description: self.description,
            status: SeriesStatus::from_str(&self.status).map_err(|e| StoreError::corrupt(T, e))?,
            cover_url: self.cover_url,
            source_url: self.source_url,
            created_at: parse_ts(T, &self.created_at)?,
            updated_at: parse_ts(T, &self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChapterRow {
    id: String,
    series_id: String,
    number: String,
    title: String,
    source_url: String,
    content: String,
    created_at: String,
}

impl ChapterRow {
    fn into_chapter(self) -> StoreResult<Chapter> {
        const T: &str = "chapters";
        let content: ChapterContent = serde_json::from_str(&self.content)?;
        Ok(Chapter {
            id: parse_uuid(T, &self.id)?,
            series_id: parse_uuid(T, &self.series_id)?,
            number: parse_number(T, &self.number)?,
            title: self.title,
            source_url: self.source_url,
            content,
            created_at: parse_ts(T, &self.created_at)?,
        })
    }
}

// ============================================================================
// JobStore
// ============================================================================

#[async_trait]
impl JobStore for SqliteStore {
    async fn insert_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job> {
        let job = job.into_job(now);
        self.insert_job_row(&job, false).await?;
        Ok(job)
    }

    async fn find_or_create_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job> {
        let Some(key) = job.dedupe_key.clone() else {
            return self.insert_job(job, now).await;
        };

        self.insert_job_row(&job.into_job(now), true).await?;

        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE dedupe_key = ?")
            .bind(&key)
            .fetch_one(&self.pool)
            .await?;
        row.into_job()
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        self.fetch_job(id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT * FROM jobs WHERE 1 = 1");
        if let Some(job_type) = &filter.job_type {
            query.push(" AND job_type = ").push_bind(job_type.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        query
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(JobRow::into_job)
            .collect()
    }

    async fn find_due_jobs(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Job>> {
        sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'pending' AND lock_token IS NULL AND scheduled_at <= ?
            ORDER BY scheduled_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(format_timestamp(now))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(JobRow::into_job)
        .collect()
    }

    async fn claim_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>> {
        let ts = format_timestamp(now);
        let claimed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running', lock_token = ?, started_at = ?, updated_at = ?
            WHERE id = ? AND status = 'pending' AND lock_token IS NULL
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&ts)
        .bind(&ts)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if claimed.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_job(id).await
    }

    async fn complete_job(
        &self,
        id: Uuid,
        lock_token: Uuid,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let ts = format_timestamp(now);
        let done = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', result = ?, completed_at = ?, lock_token = NULL, updated_at = ?
            WHERE id = ? AND status = 'running' AND lock_token = ?
            "#,
        )
        .bind(serde_json::to_string(&result)?)
        .bind(&ts)
        .bind(&ts)
        .bind(id.to_string())
        .bind(lock_token.to_string())
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected() == 1)
    }

    async fn fail_job(&self, id: Uuid, lock_token: Uuid, message: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let ts = format_timestamp(now);
        let failed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = ?, completed_at = ?, lock_token = NULL, updated_at = ?
            WHERE id = ? AND status = 'running' AND lock_token = ?
            "#,
        )
        .bind(message)
        .bind(&ts)
        .bind(&ts)
        .bind(id.to_string())
        .bind(lock_token.to_string())
        .execute(&self.pool)
        .await?;

        Ok(failed.rows_affected() == 1)
    }

    async fn cancel_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>> {
        let ts = format_timestamp(now);
        let canceled = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = ?, completed_at = ?, lock_token = NULL, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(CANCELED_MESSAGE)
        .bind(&ts)
        .bind(&ts)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if canceled.rows_affected() == 0 {
            return Ok(None);
        }
        self.fetch_job(id).await
    }

    async fn expire_stale_jobs(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let ts = format_timestamp(now);
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE jobs
            SET status = 'failed', error_message = ?, completed_at = ?, lock_token = NULL, updated_at = ?
            WHERE status = 'running' AND started_at < ?
            RETURNING id
            "#,
        )
        .bind(LOCK_EXPIRED_MESSAGE)
        .bind(&ts)
        .bind(&ts)
        .bind(format_timestamp(cutoff))
        .fetch_all(&self.pool)
        .await?;

        let mut ids = ids
            .iter()
            .map(|id| parse_uuid("jobs", id))
            .collect::<StoreResult<Vec<_>>>()?;
        ids.sort();
        Ok(ids)
    }

    async fn purge_jobs(&self, status: JobStatus, before: DateTime<Utc>) -> StoreResult<u64> {
        if !status.is_terminal() {
            return Ok(0);
        }

        let purged = sqlx::query(
            "DELETE FROM jobs WHERE status = ? AND completed_at IS NOT NULL AND completed_at < ?",
        )
        .bind(status.as_str())
        .bind(format_timestamp(before))
        .execute(&self.pool)
        .await?;

        Ok(purged.rows_affected())
    }

    async fn job_counts(&self) -> StoreResult<JobCounts> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT status, job_type, COUNT(*) FROM jobs GROUP BY status, job_type")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = JobCounts::default();
        for (status, job_type, count) in rows {
            let status: JobStatus = status.parse().map_err(|e: String| StoreError::corrupt("jobs", e))?;
            counts.record(status, &job_type, count);
        }
        Ok(counts)
    }
}

// ============================================================================
// ScheduledCrawlStore
// ============================================================================

#[async_trait]
impl ScheduledCrawlStore for SqliteStore {
    async fn insert_scheduled_crawl(&self, crawl: &ScheduledCrawl) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_crawls (
                id, series_id, source_url, cadence_type, cadence_time, cadence_days,
                max_chapters, chapter_range_start, chapter_range_end,
                request_delay_min_ms, request_delay_max_ms, status, auto_advance,
                last_run_at, next_run_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(crawl.id.to_string())
        .bind(crawl.series_id.map(|id| id.to_string()))
        .bind(&crawl.source_url)
        .bind(crawl.cadence.kind())
        .bind(crawl.cadence.time_text())
        .bind(serde_json::to_string(&crawl.cadence.day_names())?)
        .bind(crawl.max_chapters.map(|m| m.to_string()))
        .bind(crawl.chapter_range.map(|r| r.start.to_string()))
        .bind(crawl.chapter_range.map(|r| r.end.to_string()))
        .bind(crawl.request_delay.min_ms as i64)
        .bind(crawl.request_delay.max_ms as i64)
        .bind(crawl.status.as_str())
        .bind(crawl.auto_advance)
        .bind(crawl.last_run_at.map(format_timestamp))
        .bind(format_timestamp(crawl.next_run_at))
        .bind(format_timestamp(crawl.created_at))
        .bind(format_timestamp(crawl.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_scheduled_crawl(&self, crawl: &ScheduledCrawl) -> StoreResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE scheduled_crawls
            SET series_id = ?, source_url = ?, cadence_type = ?, cadence_time = ?, cadence_days = ?,
                max_chapters = ?, chapter_range_start = ?, chapter_range_end = ?,
                request_delay_min_ms = ?, request_delay_max_ms = ?, status = ?, auto_advance = ?,
                last_run_at = ?, next_run_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(crawl.series_id.map(|id| id.to_string()))
        .bind(&crawl.source_url)
        .bind(crawl.cadence.kind())
        .bind(crawl.cadence.time_text())
        .bind(serde_json::to_string(&crawl.cadence.day_names())?)
        .bind(crawl.max_chapters.map(|m| m.to_string()))
        .bind(crawl.chapter_range.map(|r| r.start.to_string()))
        .bind(crawl.chapter_range.map(|r| r.end.to_string()))
        .bind(crawl.request_delay.min_ms as i64)
        .bind(crawl.request_delay.max_ms as i64)
        .bind(crawl.status.as_str())
        .bind(crawl.auto_advance)
        .bind(crawl.last_run_at.map(format_timestamp))
        .bind(format_timestamp(crawl.next_run_at))
        .bind(format_timestamp(crawl.updated_at))
        .bind(crawl.id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "scheduled crawl",
                id: crawl.id,
            });
        }
        Ok(())
    }

    async fn get_scheduled_crawl(&self, id: Uuid) -> StoreResult<Option<ScheduledCrawl>> {
        sqlx::query_as::<_, ScheduledCrawlRow>("SELECT * FROM scheduled_crawls WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(ScheduledCrawlRow::into_scheduled_crawl)
            .transpose()
    }

    async fn list_scheduled_crawls(&self) -> StoreResult<Vec<ScheduledCrawl>> {
        sqlx::query_as::<_, ScheduledCrawlRow>("SELECT * FROM scheduled_crawls ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ScheduledCrawlRow::into_scheduled_crawl)
            .collect()
    }

    async fn delete_scheduled_crawl(&self, id: Uuid) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM scheduled_crawls WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn find_due_scheduled_crawls(&self, now: DateTime<Utc>) -> StoreResult<Vec<ScheduledCrawl>> {
        sqlx::query_as::<_, ScheduledCrawlRow>(
            r#"
            SELECT * FROM scheduled_crawls
            WHERE status = 'active' AND next_run_at <= ?
            ORDER BY next_run_at ASC, id ASC
            "#,
        )
        .bind(format_timestamp(now))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ScheduledCrawlRow::into_scheduled_crawl)
        .collect()
    }

    async fn advance_scheduled_crawl(
        &self,
        id: Uuid,
        expected: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let advanced = sqlx::query(
            r#"
            UPDATE scheduled_crawls
            SET next_run_at = ?, updated_at = ?
            WHERE id = ? AND status = 'active' AND next_run_at = ?
            "#,
        )
        .bind(format_timestamp(next_run_at))
        .bind(format_timestamp(now))
        .bind(id.to_string())
        .bind(format_timestamp(expected))
        .execute(&self.pool)
        .await?;

        Ok(advanced.rows_affected() == 1)
    }

    async fn record_scheduled_crawl_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let ts = format_timestamp(last_run_at);
        let updated = sqlx::query(
            r#"
            UPDATE scheduled_crawls
            SET last_run_at = ?, next_run_at = COALESCE(?, next_run_at), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&ts)
        .bind(next_run_at.map(format_timestamp))
        .bind(&ts)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "scheduled crawl",
                id,
            });
        }
        Ok(())
    }
}

// ============================================================================
// CatalogStore
// ============================================================================

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn get_series(&self, id: Uuid) -> StoreResult<Option<Series>> {
        self.fetch_series_where("id", id.to_string()).await
    }

    async fn find_series_by_title(&self, title: &str) -> StoreResult<Option<Series>> {
        self.fetch_series_where("title_key", title_key(title)).await
    }

    async fn find_or_create_series(&self, series: Series) -> StoreResult<Series> {
        let key = series.title_key();

        sqlx::query(
            r#"
            INSERT INTO series (
                id, title, title_key, slug, description, status, cover_url, source_url,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(title_key) DO NOTHING
            "#,
        )
        .bind(series.id.to_string())
        .bind(&series.title)
        .bind(&key)
        .bind(&series.slug)
        .bind(&series.description)
        .bind(series.status.as_str())
        .bind(&series.cover_url)
        .bind(&series.source_url)
        .bind(format_timestamp(series.created_at))
        .bind(format_timestamp(series.updated_at))
        .execute(&self.pool)
        .await?;

        self.fetch_series_where("title_key", key.clone())
            .await?
            .ok_or_else(|| StoreError::corrupt("series", format!("series {:?} vanished after insert", key)))
    }

    async fn chapter_numbers(&self, series_id: Uuid) -> StoreResult<BTreeSet<ChapterNumber>> {
        let numbers: Vec<String> = sqlx::query_scalar("SELECT number FROM chapters WHERE series_id = ?")
            .bind(series_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        numbers.iter().map(|n| parse_number("chapters", n)).collect()
    }

    async fn insert_chapters(&self, chapters: &[Chapter]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for chapter in chapters {
            sqlx::query(
                r#"
                INSERT INTO chapters (id, series_id, number, title, source_url, content, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chapter.id.to_string())
            .bind(chapter.series_id.to_string())
            .bind(chapter.number.to_string())
            .bind(&chapter.title)
            .bind(&chapter.source_url)
            .bind(serde_json::to_string(&chapter.content)?)
            .bind(format_timestamp(chapter.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                    StoreError::DuplicateChapter {
                        series_id: chapter.series_id,
                        number: chapter.number,
                    }
                } else {
                    StoreError::Database(e)
                }
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_chapters(&self, series_id: Uuid) -> StoreResult<Vec<Chapter>> {
        let mut chapters = sqlx::query_as::<_, ChapterRow>("SELECT * FROM chapters WHERE series_id = ?")
            .bind(series_id.to_string())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ChapterRow::into_chapter)
            .collect::<StoreResult<Vec<_>>>()?;

        chapters.sort_by_key(|c| c.number);
        Ok(chapters)
    }
}
