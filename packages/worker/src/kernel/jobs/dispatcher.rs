//! Job dispatcher: claims due jobs and runs them by type.
//!
//! ```text
//! find_due_jobs(now)
//!     │
//!     ├─► claim_job (CAS; losers skip)
//!     ├─► spawn: execute by job type
//!     │       ├─ recurring_crawl_check ─► run_due_crawls
//!     │       └─ single_job            ─► HandlerRegistry
//!     └─► complete_job / fail_job (guarded on the lock token)
//! ```

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{Job, JobType, SingleJobOptions};
use super::registry::SharedHandlerRegistry;
use crate::common::time::utc_now;
use crate::domains::crawling::actions::run_due_crawls;
use crate::kernel::WorkerDeps;

/// What happened to a claimed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunOutcome {
    Completed,
    Failed,
    /// Token guard rejected the final write (e.g. the reaper got there first)
    Superseded,
}

/// Totals for one dispatcher tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub due: usize,
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub superseded: usize,
    /// Jobs that could not be claimed because the store errored
    pub errors: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: JobRunOutcome) {
        match outcome {
            JobRunOutcome::Completed => self.completed += 1,
            JobRunOutcome::Failed => self.failed += 1,
            JobRunOutcome::Superseded => self.superseded += 1,
        }
    }
}

#[derive(Clone)]
pub struct JobDispatcher {
    deps: Arc<WorkerDeps>,
    registry: SharedHandlerRegistry,
}

impl JobDispatcher {
    pub fn new(deps: Arc<WorkerDeps>, registry: SharedHandlerRegistry) -> Self {
        Self { deps, registry }
    }

    /// Claim up to `batch` due jobs and run each in its own task.
    pub async fn dispatch_due(&self, now: DateTime<Utc>, batch: i64) -> Result<DispatchSummary> {
        let due = self
            .deps
            .jobs
            .find_due_jobs(now, batch)
            .await
            .context("failed to load due jobs")?;

        let mut summary = DispatchSummary {
            due: due.len(),
            ..Default::default()
        };
        let mut claimed_jobs = Vec::with_capacity(due.len());
        let mut running = Vec::with_capacity(due.len());

        for job in due {
            let claimed = match self.deps.jobs.claim_job(job.id, now).await {
                Ok(Some(claimed)) => claimed,
                Ok(None) => {
                    debug!(job_id = %job.id, "Job claimed elsewhere, skipping");
                    continue;
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "Failed to claim job");
                    summary.errors += 1;
                    continue;
                }
            };
            let Some(token) = claimed.lock_token else {
                error!(job_id = %claimed.id, "Claimed job has no lock token");
                summary.errors += 1;
                continue;
            };

            summary.claimed += 1;
            claimed_jobs.push((claimed.id, token));
            let dispatcher = self.clone();
            running.push(tokio::spawn(async move { dispatcher.run_claimed(claimed, now).await }));
        }

        let results = join_all(running).await;
        for ((id, token), result) in claimed_jobs.into_iter().zip(results) {
            match result {
                Ok(Ok(outcome)) => summary.record(outcome),
                Ok(Err(e)) => {
                    error!(job_id = %id, error = %format!("{:#}", e), "Failed to record job outcome");
                    summary.failed += 1;
                }
                Err(join_error) => {
                    fail_unfinished(&self.deps, id, token, &join_error).await;
                    summary.failed += 1;
                }
            }
        }

        if summary.claimed > 0 || summary.errors > 0 {
            info!(
                due = summary.due,
                claimed = summary.claimed,
                completed = summary.completed,
                failed = summary.failed,
                errors = summary.errors,
                "Dispatched jobs"
            );
        }
        Ok(summary)
    }

    /// Execute a job already claimed by this worker and record the result.
    pub async fn run_claimed(&self, job: Job, now: DateTime<Utc>) -> Result<JobRunOutcome> {
        let token = job
            .lock_token
            .ok_or_else(|| anyhow!("job {} is not claimed", job.id))?;
        debug!(job_id = %job.id, job_type = %job.job_type, "Running job");

        let (recorded, outcome) = match self.execute(&job, now).await {
            Ok(result) => (
                self.deps.jobs.complete_job(job.id, token, result, utc_now()).await?,
                JobRunOutcome::Completed,
            ),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(job_id = %job.id, error = %message, "Job failed");
                (
                    self.deps.jobs.fail_job(job.id, token, &message, utc_now()).await?,
                    JobRunOutcome::Failed,
                )
            }
        };

        if !recorded {
            warn!(job_id = %job.id, "Job lock was taken away before completion");
            return Ok(JobRunOutcome::Superseded);
        }
        Ok(outcome)
    }

    /// Run a job by type and return its JSON result.
    pub async fn execute(&self, job: &Job, now: DateTime<Utc>) -> Result<serde_json::Value> {
        match job.kind() {
            Ok(JobType::RecurringCrawlCheck) => {
                let report = run_due_crawls(&self.deps, now).await?;
                Ok(serde_json::to_value(report)?)
            }
            Ok(JobType::SingleJob) => {
                let options: SingleJobOptions = job
                    .typed_options()
                    .context("invalid single_job options")?;
                self.registry
                    .execute(&options.handler, options.args, self.deps.clone())
                    .await
            }
            Err(_) => bail!("unknown job type: {}", job.job_type),
        }
    }

    pub fn deps(&self) -> &Arc<WorkerDeps> {
        &self.deps
    }
}

/// Fail a claimed job whose task panicked or was cancelled. Store errors are
/// logged; the reaper expires the lock if this write never lands.
pub(crate) async fn fail_unfinished(deps: &WorkerDeps, id: Uuid, token: Uuid, join_error: &JoinError) {
    error!(job_id = %id, error = %join_error, "Job task did not finish");
    let message = if join_error.is_panic() {
        "job panicked"
    } else {
        "job task was cancelled"
    };

    match deps.jobs.fail_job(id, token, message, utc_now()).await {
        Ok(true) => {}
        Ok(false) => warn!(job_id = %id, "Unfinished job lock was already taken away"),
        Err(e) => error!(job_id = %id, error = %e, "Failed to mark unfinished job failed"),
    }
}
