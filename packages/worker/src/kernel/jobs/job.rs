//! Job model for scheduled and deferred work.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::common::{format_timestamp, truncate_to_micros, truncate_to_minute};

/// Error message recorded when an operator cancels a pending job.
pub const CANCELED_MESSAGE: &str = "canceled";

/// Error message recorded when the reaper reclaims a stale running job.
pub const LOCK_EXPIRED_MESSAGE: &str = "lock expired";

pub const DEFAULT_MAX_RETRIES: i32 = 3;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

/// Kinds of work the dispatcher knows how to run.
///
/// Stored as text so rows written by a newer build still load; an
/// unrecognized type fails the job at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Run every scheduled crawl that is due
    RecurringCrawlCheck,
    /// Invoke one registered handler with its arguments
    SingleJob,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::RecurringCrawlCheck => "recurring_crawl_check",
            JobType::SingleJob => "single_job",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recurring_crawl_check" => Ok(JobType::RecurringCrawlCheck),
            "single_job" => Ok(JobType::SingleJob),
            other => Err(format!("unknown job type: {}", other)),
        }
    }
}

impl From<JobType> for String {
    fn from(job_type: JobType) -> Self {
        job_type.as_str().to_string()
    }
}

// ============================================================================
// Typed payloads
// ============================================================================

/// Options of a `single_job`: which handler to run and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleJobOptions {
    pub handler: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub status: JobStatus,

    // Scheduling
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    // Payload
    pub options: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,

    // Claim
    pub lock_token: Option<Uuid>,

    // Retry chain
    pub retry_count: i32,
    pub max_retries: i32,
    pub parent_job_id: Option<Uuid>,

    /// Idempotency key for materialized jobs; unique when set
    pub dedupe_key: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn kind(&self) -> Result<JobType, String> {
        self.job_type.parse()
    }

    /// Decode `options` into the payload type of this job's kind.
    pub fn typed_options<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.options.clone())
    }

    /// Decode `result`, if the job produced one.
    pub fn typed_result<T: DeserializeOwned>(&self) -> serde_json::Result<Option<T>> {
        self.result.clone().map(serde_json::from_value).transpose()
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// A job to be inserted.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewJob {
    pub job_type: String,
    #[builder(default = serde_json::json!({}))]
    pub options: serde_json::Value,
    pub scheduled_at: DateTime<Utc>,
    #[builder(default = DEFAULT_MAX_RETRIES)]
    pub max_retries: i32,
    #[builder(default = 0)]
    pub retry_count: i32,
    #[builder(default, setter(strip_option))]
    pub parent_job_id: Option<Uuid>,
    #[builder(default, setter(strip_option))]
    pub dedupe_key: Option<String>,
}

impl NewJob {
    /// The recurring check for the minute containing `tick`.
    pub fn recurring_crawl_check(tick: DateTime<Utc>) -> Self {
        let scheduled_at = truncate_to_minute(tick);
        NewJob::builder()
            .job_type(JobType::RecurringCrawlCheck)
            .scheduled_at(scheduled_at)
            .dedupe_key(recurring_check_dedupe_key(scheduled_at))
            .build()
    }

    /// A deferred handler invocation due at `run_at`.
    pub fn single(options: &SingleJobOptions, run_at: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(NewJob::builder()
            .job_type(JobType::SingleJob)
            .options(serde_json::to_value(options)?)
            .scheduled_at(run_at)
            .build())
    }

    /// Retry of a failed job: same work, new row, linked to its parent.
    pub fn retry_of(parent: &Job, now: DateTime<Utc>) -> Self {
        NewJob::builder()
            .job_type(parent.job_type.clone())
            .options(parent.options.clone())
            .scheduled_at(now)
            .max_retries(parent.max_retries)
            .retry_count(parent.retry_count + 1)
            .parent_job_id(parent.id)
            .build()
    }

    pub fn into_job(self, now: DateTime<Utc>) -> Job {
        let now = truncate_to_micros(now);
        Job {
            id: Uuid::now_v7(),
            job_type: self.job_type,
            status: JobStatus::Pending,
            scheduled_at: truncate_to_micros(self.scheduled_at),
            started_at: None,
            completed_at: None,
            options: self.options,
            result: None,
            error_message: None,
            lock_token: None,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            parent_job_id: self.parent_job_id,
            dedupe_key: self.dedupe_key,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `recurring_crawl_check:<minute>`; one job per minute at most.
pub fn recurring_check_dedupe_key(tick: DateTime<Utc>) -> String {
    format!(
        "{}:{}",
        JobType::RecurringCrawlCheck,
        format_timestamp(truncate_to_minute(tick))
    )
}

// ============================================================================
// Queries
// ============================================================================

/// Filter for listing jobs, newest first.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub job_type: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self {
            job_type: None,
            status: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl JobFilter {
    pub fn with_type(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = Some(job_type.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit.max(0);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset.max(0);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        self.job_type.as_deref().map_or(true, |t| t == job.job_type)
            && self.status.map_or(true, |s| s == job.status)
    }
}

/// Job totals by status and by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
    pub total: i64,
}

impl JobCounts {
    pub fn record(&mut self, status: JobStatus, job_type: &str, count: i64) {
        *self.by_status.entry(status.to_string()).or_default() += count;
        *self.by_type.entry(job_type.to_string()).or_default() += count;
        self.total += count;
    }

    pub fn status(&self, status: JobStatus) -> i64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn job_type(&self, job_type: &str) -> i64 {
        self.by_type.get(job_type).copied().unwrap_or(0)
    }
}
