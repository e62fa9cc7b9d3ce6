//! Job scheduling and lifecycle actions that callers outside the
//! scheduler use: deferring work, retrying and canceling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::job::{Job, JobStatus, NewJob, SingleJobOptions};
use crate::common::time::utc_now;
use crate::error::JobError;
use crate::store::JobStore;

/// Enqueue a `single_job` that runs `handler_id` with `args` at `run_at`.
pub async fn schedule_job(
    jobs: &dyn JobStore,
    handler_id: &str,
    args: serde_json::Value,
    run_at: DateTime<Utc>,
) -> Result<Job, JobError> {
    let options = SingleJobOptions {
        handler: handler_id.to_string(),
        args,
    };
    let job = jobs.insert_job(NewJob::single(&options, run_at)?, utc_now()).await?;

    info!(job_id = %job.id, handler = handler_id, run_at = %run_at, "Scheduled job");
    Ok(job)
}

#[derive(Clone)]
pub struct JobManager {
    jobs: Arc<dyn JobStore>,
}

impl JobManager {
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    pub async fn schedule_job(
        &self,
        handler_id: &str,
        args: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> Result<Job, JobError> {
        schedule_job(self.jobs.as_ref(), handler_id, args, run_at).await
    }

    /// Like [`schedule_job`](Self::schedule_job) with arguments checked at compile time.
    pub async fn schedule_typed<A: Serialize>(
        &self,
        handler_id: &str,
        args: &A,
        run_at: DateTime<Utc>,
    ) -> Result<Job, JobError> {
        self.schedule_job(handler_id, serde_json::to_value(args)?, run_at)
            .await
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Job, JobError> {
        self.jobs.get_job(id).await?.ok_or(JobError::NotFound(id))
    }

    /// Create a new pending job from a failed one. The failed job is left as is.
    pub async fn retry_job(&self, id: Uuid, now: DateTime<Utc>) -> Result<Job, JobError> {
        let parent = self.get_job(id).await?;

        if parent.status != JobStatus::Failed {
            return Err(JobError::InvalidState {
                id,
                actual: parent.status,
                expected: JobStatus::Failed,
            });
        }
        if !parent.can_retry() {
            return Err(JobError::RetriesExhausted {
                id,
                max_retries: parent.max_retries,
            });
        }

        let retry = self.jobs.insert_job(NewJob::retry_of(&parent, now), now).await?;
        info!(job_id = %retry.id, parent_job_id = %id, retry_count = retry.retry_count, "Retrying job");
        Ok(retry)
    }

    /// Cancel a pending job.
    pub async fn cancel_job(&self, id: Uuid, now: DateTime<Utc>) -> Result<Job, JobError> {
        if let Some(job) = self.jobs.cancel_job(id, now).await? {
            info!(job_id = %id, "Canceled job");
            return Ok(job);
        }

        let current = self.get_job(id).await?;
        Err(JobError::InvalidState {
            id,
            actual: current.status,
            expected: JobStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::{JobType, CANCELED_MESSAGE};
    use crate::store::MemoryStore;

    fn manager() -> (Arc<MemoryStore>, JobManager) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), JobManager::new(store))
    }

    #[tokio::test]
    async fn test_schedule_typed() {
        let (_, manager) = manager();
        let run_at = Utc::now();

        let job = manager
            .schedule_typed("say_hello", &serde_json::json!({"name": "x"}), run_at)
            .await
            .unwrap();

        assert_eq!(job.kind(), Ok(JobType::SingleJob));
        assert_eq!(job.status, JobStatus::Pending);
        let options: SingleJobOptions = job.typed_options().unwrap();
        assert_eq!(options.handler, "say_hello");
    }

    #[tokio::test]
    async fn test_retry_requires_failed() {
        let (_, manager) = manager();
        let job = manager
            .schedule_job("h", serde_json::json!({}), Utc::now())
            .await
            .unwrap();

        let err = manager.retry_job(job.id, Utc::now()).await.unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidState {
                actual: JobStatus::Pending,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let (store, manager) = manager();
        let now = Utc::now();
        let mut new_job = NewJob::single(
            &SingleJobOptions {
                handler: "h".into(),
                args: serde_json::json!({}),
            },
            now,
        )
        .unwrap();
        new_job.retry_count = 3;
        let job = store.insert_job(new_job, now).await.unwrap();
        let claimed = store.claim_job(job.id, now).await.unwrap().unwrap();
        let token = claimed.lock_token.unwrap();
        store.fail_job(job.id, token, "boom", now).await.unwrap();

        let err = manager.retry_job(job.id, now).await.unwrap_err();
        assert!(matches!(err, JobError::RetriesExhausted { max_retries: 3, .. }));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (_, manager) = manager();
        let job = manager
            .schedule_job("h", serde_json::json!({}), Utc::now())
            .await
            .unwrap();

        let canceled = manager.cancel_job(job.id, Utc::now()).await.unwrap();
        assert_eq!(canceled.status, JobStatus::Failed);
        assert_eq!(canceled.error_message.as_deref(), Some(CANCELED_MESSAGE));

        let again = manager.cancel_job(job.id, Utc::now()).await.unwrap_err();
        assert!(matches!(
            again,
            JobError::InvalidState {
                actual: JobStatus::Failed,
                ..
            }
        ));

        assert!(matches!(
            manager.cancel_job(Uuid::now_v7(), Utc::now()).await,
            Err(JobError::NotFound(_))
        ));
    }
}
