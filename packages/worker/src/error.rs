//! Typed errors for the worker's stores, job lifecycle and operator actions.
//!
//! Tick handlers and job handlers use `anyhow`; these enums are for the
//! places where callers branch on the failure.

use extraction::ChapterNumber;
use thiserror::Error;
use uuid::Uuid;

use crate::kernel::jobs::JobStatus;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value could not be decoded
    #[error("corrupt {table} row: {reason}")]
    Corrupt { table: &'static str, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// `(series, number)` already stored
    #[error("chapter {number} already exists for series {series_id}")]
    DuplicateChapter { series_id: Uuid, number: ChapterNumber },
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            table,
            reason: reason.to_string(),
        }
    }
}

/// Job lifecycle violations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("job {id} is {actual}, expected {expected}")]
    InvalidState {
        id: Uuid,
        actual: JobStatus,
        expected: JobStatus,
    },

    #[error("job {id} has used all {max_retries} retries")]
    RetriesExhausted { id: Uuid, max_retries: i32 },

    #[error("failed to encode job options: {0}")]
    Options(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejected scheduled-crawl settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("chapter range requires a numeric max chapters")]
    RangeWithoutLimit,

    #[error("chapter range start {start} is greater than end {end}")]
    InvalidRange {
        start: ChapterNumber,
        end: ChapterNumber,
    },

    #[error("max chapters must be at least 1")]
    ZeroMaxChapters,

    #[error("request delay min {min_ms}ms is greater than max {max_ms}ms")]
    InvalidDelayRange { min_ms: u64, max_ms: u64 },

    #[error("invalid cadence: {0}")]
    InvalidCadence(String),

    #[error("invalid source URL: {0}")]
    InvalidSourceUrl(String),
}

/// Errors surfaced by [`crate::operator::OperatorService`].
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("scheduled crawl not found: {0}")]
    ScheduledCrawlNotFound(Uuid),
}

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
