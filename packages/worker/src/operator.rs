//! Operator actions: manage scheduled crawls and inspect or steer jobs.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::common::time::utc_now;
use crate::domains::crawling::models::{NewScheduledCrawl, ScheduledCrawl, ScheduledCrawlUpdate};
use crate::domains::crawling::RunScheduledCrawlJob;
use crate::error::OperatorError;
use crate::kernel::jobs::{Job, JobCounts, JobFilter, JobManager};
use crate::kernel::WorkerDeps;

pub type OperatorResult<T> = std::result::Result<T, OperatorError>;

#[derive(Clone)]
pub struct OperatorService {
    deps: Arc<WorkerDeps>,
    jobs: JobManager,
}

impl OperatorService {
    pub fn new(deps: Arc<WorkerDeps>) -> Self {
        Self {
            jobs: JobManager::new(deps.jobs.clone()),
            deps,
        }
    }

    // ------------------------------------------------------------------------
    // Scheduled crawls
    // ------------------------------------------------------------------------

    pub async fn create_scheduled_crawl(&self, new: NewScheduledCrawl) -> OperatorResult<ScheduledCrawl> {
        let crawl = new.into_scheduled_crawl(utc_now())?;
        self.deps.scheduled_crawls.insert_scheduled_crawl(&crawl).await?;

        info!(
            scheduled_crawl_id = %crawl.id,
            url = %crawl.source_url,
            next_run_at = %crawl.next_run_at,
            "Created scheduled crawl"
        );
        Ok(crawl)
    }

    pub async fn update_scheduled_crawl(
        &self,
        id: Uuid,
        update: ScheduledCrawlUpdate,
    ) -> OperatorResult<ScheduledCrawl> {
        let current = self.get_scheduled_crawl(id).await?;
        let updated = update.apply(&current, utc_now())?;
        self.deps.scheduled_crawls.update_scheduled_crawl(&updated).await?;
        Ok(updated)
    }

    pub async fn delete_scheduled_crawl(&self, id: Uuid) -> OperatorResult<()> {
        if !self.deps.scheduled_crawls.delete_scheduled_crawl(id).await? {
            return Err(OperatorError::ScheduledCrawlNotFound(id));
        }
        info!(scheduled_crawl_id = %id, "Deleted scheduled crawl");
        Ok(())
    }

    pub async fn get_scheduled_crawl(&self, id: Uuid) -> OperatorResult<ScheduledCrawl> {
        self.deps
            .scheduled_crawls
            .get_scheduled_crawl(id)
            .await?
            .ok_or(OperatorError::ScheduledCrawlNotFound(id))
    }

    pub async fn list_scheduled_crawls(&self) -> OperatorResult<Vec<ScheduledCrawl>> {
        Ok(self.deps.scheduled_crawls.list_scheduled_crawls().await?)
    }

    /// Queue an immediate run of one scheduled crawl. The dispatcher picks it
    /// up on its next tick.
    pub async fn trigger_scheduled_crawl(&self, id: Uuid) -> OperatorResult<Job> {
        let crawl = self.get_scheduled_crawl(id).await?;
        let job = self
            .jobs
            .schedule_typed(
                RunScheduledCrawlJob::HANDLER,
                &RunScheduledCrawlJob::new(crawl.id),
                utc_now(),
            )
            .await?;
        Ok(job)
    }

    // ------------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------------

    pub async fn list_jobs(&self, filter: &JobFilter) -> OperatorResult<Vec<Job>> {
        Ok(self.deps.jobs.list_jobs(filter).await?)
    }

    pub async fn get_job(&self, id: Uuid) -> OperatorResult<Job> {
        Ok(self.jobs.get_job(id).await?)
    }

    pub async fn retry_job(&self, id: Uuid) -> OperatorResult<Job> {
        Ok(self.jobs.retry_job(id, utc_now()).await?)
    }

    pub async fn cancel_job(&self, id: Uuid) -> OperatorResult<Job> {
        Ok(self.jobs.cancel_job(id, utc_now()).await?)
    }

    pub async fn job_counts(&self) -> OperatorResult<JobCounts> {
        Ok(self.deps.jobs.job_counts().await?)
    }

    /// Deferred execution of any registered handler.
    pub async fn schedule_job(
        &self,
        handler_id: &str,
        args: serde_json::Value,
        run_at: chrono::DateTime<Utc>,
    ) -> OperatorResult<Job> {
        self.jobs
            .schedule_job(handler_id, args, run_at)
            .await
            .map_err(OperatorError::from)
    }
}
