//! Job state machine: claims, token guards, retries, reaping and compaction.

mod common;

use crate::common::*;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use test_context::test_context;
use uuid::Uuid;
use worker_core::error::{JobError, StoreError, StoreResult};
use worker_core::kernel::jobs::{
    Job, JobCounts, JobFilter, JobManager, JobStatus, NewJob, CANCELED_MESSAGE, LOCK_EXPIRED_MESSAGE,
};
use worker_core::kernel::WorkerDeps;
use worker_core::store::{JobStore, MemoryStore};

// =============================================================================
// Test Helpers
// =============================================================================

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn single(now: DateTime<Utc>) -> NewJob {
    NewJob::builder()
        .job_type("single_job")
        .options(serde_json::json!({"handler": "noop", "args": {}}))
        .scheduled_at(now)
        .build()
}

async fn claim_race(store: Arc<dyn JobStore>, job: &Job, contenders: usize) -> Vec<Job> {
    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let store = store.clone();
            let id = job.id;
            tokio::spawn(async move { store.claim_job(id, t0()).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(claimed) = handle.await.unwrap().unwrap() {
            winners.push(claimed);
        }
    }
    winners
}

async fn failed_job(store: &dyn JobStore, retry_count: i32) -> Job {
    let new = NewJob {
        retry_count,
        ..single(t0())
    };
    let job = store.insert_job(new, t0()).await.unwrap();
    let claimed = store.claim_job(job.id, t0()).await.unwrap().unwrap();
    assert!(store
        .fail_job(job.id, claimed.lock_token.unwrap(), "boom", t0())
        .await
        .unwrap());
    store.get_job(job.id).await.unwrap().unwrap()
}

/// Job store whose claims on one job always error.
struct BrokenClaims {
    inner: Arc<dyn JobStore>,
    broken: Uuid,
}

#[async_trait]
impl JobStore for BrokenClaims {
    async fn insert_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job> {
        self.inner.insert_job(job, now).await
    }

    async fn find_or_create_job(&self, job: NewJob, now: DateTime<Utc>) -> StoreResult<Job> {
        self.inner.find_or_create_job(job, now).await
    }

    async fn get_job(&self, id: Uuid) -> StoreResult<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        self.inner.list_jobs(filter).await
    }

    async fn find_due_jobs(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Job>> {
        self.inner.find_due_jobs(now, limit).await
    }

    async fn claim_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>> {
        if id == self.broken {
            return Err(StoreError::Corrupt {
                table: "jobs",
                reason: "database is locked".to_string(),
            });
        }
        self.inner.claim_job(id, now).await
    }

    async fn complete_job(
        &self,
        id: Uuid,
        lock_token: Uuid,
        result: serde_json::Value,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.inner.complete_job(id, lock_token, result, now).await
    }

    async fn fail_job(&self, id: Uuid, lock_token: Uuid, message: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.fail_job(id, lock_token, message, now).await
    }

    async fn cancel_job(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Job>> {
        self.inner.cancel_job(id, now).await
    }

    async fn expire_stale_jobs(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        self.inner.expire_stale_jobs(cutoff, now).await
    }

    async fn purge_jobs(&self, status: JobStatus, before: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.purge_jobs(status, before).await
    }

    async fn job_counts(&self) -> StoreResult<JobCounts> {
        self.inner.job_counts().await
    }
}

// =============================================================================
// Claims
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_claims_have_one_winner(ctx: &TestHarness) {
    let job = ctx.store.insert_job(single(t0()), t0()).await.unwrap();

    let winners = claim_race(ctx.store.clone(), &job, 8).await;

    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].status, JobStatus::Running);
    assert_eq!(winners[0].started_at, Some(t0()));
    assert!(winners[0].lock_token.is_some());
}

#[tokio::test]
async fn concurrent_claims_have_one_winner_in_memory() {
    let store = Arc::new(MemoryStore::new());
    let job = store.insert_job(single(t0()), t0()).await.unwrap();

    let winners = claim_race(store, &job, 8).await;
    assert_eq!(winners.len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn claimed_job_is_no_longer_due(ctx: &TestHarness) {
    let job = ctx.store.insert_job(single(t0()), t0()).await.unwrap();
    ctx.store.claim_job(job.id, t0()).await.unwrap().unwrap();

    assert!(ctx.store.find_due_jobs(t0(), 10).await.unwrap().is_empty());
    assert!(ctx.store.claim_job(job.id, t0()).await.unwrap().is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn future_jobs_are_not_due(ctx: &TestHarness) {
    ctx.store
        .insert_job(single(t0() + Duration::minutes(10)), t0())
        .await
        .unwrap();

    assert!(ctx.store.find_due_jobs(t0(), 10).await.unwrap().is_empty());
    assert_eq!(
        ctx.store
            .find_due_jobs(t0() + Duration::minutes(10), 10)
            .await
            .unwrap()
            .len(),
        1
    );
}

// =============================================================================
// Token Guard
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn completion_requires_the_lock_token(ctx: &TestHarness) {
    let job = ctx.store.insert_job(single(t0()), t0()).await.unwrap();
    let claimed = ctx.store.claim_job(job.id, t0()).await.unwrap().unwrap();

    let wrong = ctx
        .store
        .complete_job(job.id, Uuid::new_v4(), serde_json::json!({}), t0())
        .await
        .unwrap();
    assert!(!wrong);
    assert_eq!(ctx.job_status(job.id).await, JobStatus::Running);

    let right = ctx
        .store
        .complete_job(job.id, claimed.lock_token.unwrap(), serde_json::json!({"ok": true}), t0())
        .await
        .unwrap();
    assert!(right);

    let done = ctx.job(job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.result, Some(serde_json::json!({"ok": true})));
    assert_eq!(done.lock_token, None);
    assert_eq!(done.completed_at, Some(t0()));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reaped_job_rejects_late_completion(ctx: &TestHarness) {
    let job = ctx.store.insert_job(single(t0()), t0()).await.unwrap();
    let claimed = ctx.store.claim_job(job.id, t0()).await.unwrap().unwrap();

    let expired = ctx.loops.reap(t0() + Duration::hours(3)).await.unwrap();
    assert_eq!(expired, vec![job.id]);

    let reaped = ctx.job(job.id).await;
    assert_eq!(reaped.status, JobStatus::Failed);
    assert_eq!(reaped.error_message.as_deref(), Some(LOCK_EXPIRED_MESSAGE));

    let late = ctx
        .store
        .complete_job(job.id, claimed.lock_token.unwrap(), serde_json::json!({}), t0() + Duration::hours(3))
        .await
        .unwrap();
    assert!(!late);
    assert_eq!(ctx.job_status(job.id).await, JobStatus::Failed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn reaper_spares_jobs_inside_the_window(ctx: &TestHarness) {
    let job = ctx.store.insert_job(single(t0()), t0()).await.unwrap();
    ctx.store.claim_job(job.id, t0()).await.unwrap().unwrap();

    let expired = ctx.loops.reap(t0() + Duration::minutes(90)).await.unwrap();
    assert!(expired.is_empty());
    assert_eq!(ctx.job_status(job.id).await, JobStatus::Running);
}

// =============================================================================
// Cancel
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_only_applies_to_pending_jobs(ctx: &TestHarness) {
    let manager = JobManager::new(ctx.deps.jobs.clone());
    let pending = ctx.store.insert_job(single(t0()), t0()).await.unwrap();

    let canceled = manager.cancel_job(pending.id, t0()).await.unwrap();
    assert_eq!(canceled.status, JobStatus::Failed);
    assert_eq!(canceled.error_message.as_deref(), Some(CANCELED_MESSAGE));

    let running = ctx.store.insert_job(single(t0()), t0()).await.unwrap();
    ctx.store.claim_job(running.id, t0()).await.unwrap().unwrap();

    match manager.cancel_job(running.id, t0()).await {
        Err(JobError::InvalidState { actual, .. }) => assert_eq!(actual, JobStatus::Running),
        other => panic!("expected invalid state, got {:?}", other),
    }
    assert!(matches!(
        manager.cancel_job(Uuid::new_v4(), t0()).await,
        Err(JobError::NotFound(_))
    ));
}

// =============================================================================
// Retry Lineage
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn retry_creates_linked_child(ctx: &TestHarness) {
    let manager = JobManager::new(ctx.deps.jobs.clone());
    let parent = failed_job(ctx.store.as_ref(), 0).await;

    let child = manager.retry_job(parent.id, t0()).await.unwrap();

    assert_ne!(child.id, parent.id);
    assert_eq!(child.status, JobStatus::Pending);
    assert_eq!(child.parent_job_id, Some(parent.id));
    assert_eq!(child.retry_count, 1);
    assert_eq!(child.job_type, parent.job_type);
    assert_eq!(child.options, parent.options);

    // The parent row is left untouched
    assert_eq!(ctx.job(parent.id).await, parent);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn retry_refused_when_exhausted(ctx: &TestHarness) {
    let manager = JobManager::new(ctx.deps.jobs.clone());
    let parent = failed_job(ctx.store.as_ref(), 3).await;

    assert!(matches!(
        manager.retry_job(parent.id, t0()).await,
        Err(JobError::RetriesExhausted { max_retries: 3, .. })
    ));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn retry_refused_unless_failed(ctx: &TestHarness) {
    let manager = JobManager::new(ctx.deps.jobs.clone());
    let pending = ctx.store.insert_job(single(t0()), t0()).await.unwrap();

    assert!(matches!(
        manager.retry_job(pending.id, t0()).await,
        Err(JobError::InvalidState { .. })
    ));
}

// =============================================================================
// Compaction
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn compaction_applies_retention_per_status(ctx: &TestHarness) {
    let now = t0() + Duration::days(40);

    let mut ids = Vec::new();
    for (finished, succeed) in [
        (now - Duration::days(8), true),   // old completed: purged
        (now - Duration::days(6), true),   // recent completed: kept
        (now - Duration::days(31), false), // old failed: purged
        (now - Duration::days(20), false), // recent failed: kept
    ] {
        let job = ctx.store.insert_job(single(finished), finished).await.unwrap();
        let token = ctx
            .store
            .claim_job(job.id, finished)
            .await
            .unwrap()
            .unwrap()
            .lock_token
            .unwrap();
        if succeed {
            ctx.store
                .complete_job(job.id, token, serde_json::json!({}), finished)
                .await
                .unwrap();
        } else {
            ctx.store.fail_job(job.id, token, "boom", finished).await.unwrap();
        }
        ids.push(job.id);
    }
    let pending = ctx.store.insert_job(single(t0()), t0()).await.unwrap();

    let summary = ctx.loops.compact(now).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);

    let remaining: Vec<Uuid> = ctx
        .store
        .list_jobs(&JobFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert!(!remaining.contains(&ids[0]));
    assert!(remaining.contains(&ids[1]));
    assert!(!remaining.contains(&ids[2]));
    assert!(remaining.contains(&ids[3]));
    assert!(remaining.contains(&pending.id));
}

// =============================================================================
// Dispatch
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_job_type_fails(ctx: &TestHarness) {
    let job = ctx
        .store
        .insert_job(
            NewJob::builder().job_type("mystery").scheduled_at(t0()).build(),
            t0(),
        )
        .await
        .unwrap();

    let summary = ctx.loops.dispatch(t0()).await.unwrap();
    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.failed, 1);

    let failed = ctx.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("unknown job type: mystery"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_handler_fails(ctx: &TestHarness) {
    let job = ctx.store.insert_job(single(t0()), t0()).await.unwrap();

    ctx.loops.dispatch(t0()).await.unwrap();

    let failed = ctx.job(job.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("unknown handler: noop"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn claim_error_skips_only_that_job(ctx: &TestHarness) {
    let stuck = ctx.store.insert_job(single(t0()), t0()).await.unwrap();
    let other = ctx
        .store
        .insert_job(single(t0()), t0() + Duration::seconds(1))
        .await
        .unwrap();

    let deps = Arc::new(WorkerDeps {
        jobs: Arc::new(BrokenClaims {
            inner: ctx.store.clone(),
            broken: stuck.id,
        }),
        ..(*ctx.deps).clone()
    });
    let summary = ctx.loops_for(deps).dispatch(t0()).await.unwrap();

    assert_eq!(summary.due, 2);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.claimed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(ctx.job_status(stuck.id).await, JobStatus::Pending);
    assert_eq!(ctx.job_status(other.id).await, JobStatus::Failed);

    let retried = ctx.loops.dispatch(t0()).await.unwrap();
    assert_eq!(retried.claimed, 1);
    assert_eq!(ctx.job_status(stuck.id).await, JobStatus::Failed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn panicking_job_is_failed_with_its_token(ctx: &TestHarness) {
    let crawl = ctx
        .operator
        .create_scheduled_crawl(auto_advance_crawl())
        .await
        .unwrap();
    let job = ctx.operator.trigger_scheduled_crawl(crawl.id).await.unwrap();
    let bystander = ctx.store.insert_job(single(t0()), t0()).await.unwrap();

    let loops = ctx.loops_for(ctx.deps_with_fetcher(Arc::new(PanickingFetcher)));
    let summary = loops.dispatch(Utc::now()).await.unwrap();

    assert_eq!(summary.claimed, 2);
    assert_eq!(summary.failed, 2);

    let panicked = ctx.job(job.id).await;
    assert_eq!(panicked.status, JobStatus::Failed);
    assert_eq!(panicked.error_message.as_deref(), Some("job panicked"));
    assert_eq!(panicked.lock_token, None);

    let other = ctx.job(bystander.id).await;
    assert_eq!(other.error_message.as_deref(), Some("unknown handler: noop"));
}
