//! Background loops driven by tokio-cron-scheduler.
//!
//! ```text
//! Scheduler
//!     ├─► materialize (every 5 min)  find-or-create this minute's recurring check, run it
//!     ├─► dispatch    (every 1 min)  claim and run due jobs
//!     ├─► reap        (every 5 min)  fail jobs running past the execution window
//!     └─► compact     (hourly)       delete old completed and failed jobs
//! ```
//!
//! Each loop is also a plain async method on [`SchedulerLoops`] taking `now`,
//! so tests drive ticks directly without the cron timer.

use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::jobs::dispatcher::fail_unfinished;
use super::jobs::{
    DispatchSummary, JobDispatcher, JobRunOutcome, JobStatus, NewJob, SharedHandlerRegistry,
};
use super::WorkerDeps;
use crate::common::time::utc_now;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub materialize_cron: String,
    pub dispatch_cron: String,
    pub reap_cron: String,
    pub compact_cron: String,
    /// Running jobs older than this are failed by the reaper
    pub max_execution: Duration,
    pub completed_retention: Duration,
    pub failed_retention: Duration,
    pub dispatch_batch_size: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            materialize_cron: "0 */5 * * * *".to_string(),
            dispatch_cron: "0 * * * * *".to_string(),
            reap_cron: "30 */5 * * * *".to_string(),
            compact_cron: "0 0 * * * *".to_string(),
            max_execution: Duration::hours(2),
            completed_retention: Duration::days(7),
            failed_retention: Duration::days(30),
            dispatch_batch_size: 20,
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_execution(mut self, max_execution: Duration) -> Self {
        self.max_execution = max_execution;
        self
    }

    pub fn with_retention(mut self, completed: Duration, failed: Duration) -> Self {
        self.completed_retention = completed;
        self.failed_retention = failed;
        self
    }

    pub fn with_dispatch_batch_size(mut self, size: i64) -> Self {
        self.dispatch_batch_size = size.max(1);
        self
    }

    pub fn with_crons(
        mut self,
        materialize: impl Into<String>,
        dispatch: impl Into<String>,
        reap: impl Into<String>,
        compact: impl Into<String>,
    ) -> Self {
        self.materialize_cron = materialize.into();
        self.dispatch_cron = dispatch.into();
        self.reap_cron = reap.into();
        self.compact_cron = compact.into();
        self
    }
}

/// Rows deleted by one compaction tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionSummary {
    pub completed: u64,
    pub failed: u64,
}

/// The four loop bodies.
pub struct SchedulerLoops {
    deps: Arc<WorkerDeps>,
    dispatcher: JobDispatcher,
    config: SchedulerConfig,
}

impl SchedulerLoops {
    pub fn new(deps: Arc<WorkerDeps>, registry: SharedHandlerRegistry, config: SchedulerConfig) -> Self {
        Self {
            dispatcher: JobDispatcher::new(deps.clone(), registry),
            deps,
            config,
        }
    }

    /// Ensure this minute's recurring check exists and run it if still pending.
    ///
    /// Returns the job id when this tick ran it; `None` when another tick or
    /// replica owns it.
    pub async fn materialize(&self, now: DateTime<Utc>) -> Result<Option<Uuid>> {
        let job = self
            .deps
            .jobs
            .find_or_create_job(NewJob::recurring_crawl_check(now), now)
            .await
            .context("failed to materialize recurring check")?;

        if job.status != JobStatus::Pending {
            debug!(job_id = %job.id, status = %job.status, "Recurring check already handled");
            return Ok(None);
        }

        let Some(claimed) = self.deps.jobs.claim_job(job.id, now).await? else {
            debug!(job_id = %job.id, "Recurring check claimed elsewhere");
            return Ok(None);
        };

        let id = claimed.id;
        let token = claimed
            .lock_token
            .ok_or_else(|| anyhow!("claimed recurring check {} has no lock token", id))?;
        let dispatcher = self.dispatcher.clone();
        let outcome = match tokio::spawn(async move { dispatcher.run_claimed(claimed, now).await }).await {
            Ok(outcome) => outcome?,
            Err(join_error) => {
                fail_unfinished(&self.deps, id, token, &join_error).await;
                return Err(anyhow!("recurring check {} did not finish: {}", id, join_error));
            }
        };

        if outcome == JobRunOutcome::Completed {
            info!(job_id = %id, "Recurring check completed");
        }
        Ok(Some(id))
    }

    pub async fn dispatch(&self, now: DateTime<Utc>) -> Result<DispatchSummary> {
        self.dispatcher
            .dispatch_due(now, self.config.dispatch_batch_size)
            .await
    }

    /// Fail running jobs whose lock is older than the execution window.
    pub async fn reap(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let cutoff = now - self.config.max_execution;
        let expired = self
            .deps
            .jobs
            .expire_stale_jobs(cutoff, now)
            .await
            .context("failed to expire stale jobs")?;

        for id in &expired {
            warn!(job_id = %id, "Expired stale job lock");
        }
        Ok(expired)
    }

    pub async fn compact(&self, now: DateTime<Utc>) -> Result<CompactionSummary> {
        let completed = self
            .deps
            .jobs
            .purge_jobs(JobStatus::Completed, now - self.config.completed_retention)
            .await
            .context("failed to purge completed jobs")?;
        let failed = self
            .deps
            .jobs
            .purge_jobs(JobStatus::Failed, now - self.config.failed_retention)
            .await
            .context("failed to purge failed jobs")?;

        if completed + failed > 0 {
            info!(completed, failed, "Compacted job history");
        }
        Ok(CompactionSummary { completed, failed })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

/// Owns the cron scheduler and the loop handles. Build once at startup,
/// `start` it, and `shutdown` it on exit.
pub struct Scheduler {
    loops: Arc<SchedulerLoops>,
    cron: Option<JobScheduler>,
}

impl Scheduler {
    pub fn new(deps: Arc<WorkerDeps>, registry: SharedHandlerRegistry, config: SchedulerConfig) -> Self {
        Self {
            loops: Arc::new(SchedulerLoops::new(deps, registry, config)),
            cron: None,
        }
    }

    pub fn loops(&self) -> &Arc<SchedulerLoops> {
        &self.loops
    }

    pub fn is_running(&self) -> bool {
        self.cron.is_some()
    }

    /// Register the four loops and start the cron timer.
    pub async fn start(&mut self) -> Result<()> {
        if self.cron.is_some() {
            return Ok(());
        }

        let scheduler = JobScheduler::new().await?;
        let config = self.loops.config().clone();

        scheduler
            .add(tick_job(&config.materialize_cron, "materialize", self.loops.clone(), |loops, now| async move {
                loops.materialize(now).await.map(|_| ())
            })?)
            .await?;
        scheduler
            .add(tick_job(&config.dispatch_cron, "dispatch", self.loops.clone(), |loops, now| async move {
                loops.dispatch(now).await.map(|_| ())
            })?)
            .await?;
        scheduler
            .add(tick_job(&config.reap_cron, "reap", self.loops.clone(), |loops, now| async move {
                loops.reap(now).await.map(|_| ())
            })?)
            .await?;
        scheduler
            .add(tick_job(&config.compact_cron, "compact", self.loops.clone(), |loops, now| async move {
                loops.compact(now).await.map(|_| ())
            })?)
            .await?;

        scheduler.start().await?;
        self.cron = Some(scheduler);

        info!(
            materialize = %config.materialize_cron,
            dispatch = %config.dispatch_cron,
            reap = %config.reap_cron,
            compact = %config.compact_cron,
            "Scheduler started"
        );
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut scheduler) = self.cron.take() {
            scheduler.shutdown().await?;
            info!("Scheduler stopped");
        }
        Ok(())
    }
}

/// Wrap a loop body in a cron job. Errors are logged, never propagated.
fn tick_job<F, Fut>(schedule: &str, name: &'static str, loops: Arc<SchedulerLoops>, tick: F) -> Result<CronJob>
where
    F: Fn(Arc<SchedulerLoops>, DateTime<Utc>) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let job = CronJob::new_async(schedule, move |_uuid, _lock| {
        let loops = loops.clone();
        let tick = tick.clone();
        Box::pin(async move {
            if let Err(e) = tick(loops, utc_now()).await {
                tracing::error!(tick = name, error = %format!("{:#}", e), "Scheduler tick failed");
            }
        })
    })
    .with_context(|| format!("invalid cron expression for {}: {}", name, schedule))?;

    Ok(job)
}
