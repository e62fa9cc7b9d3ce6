//! Deferred crawl work runnable through the handler registry.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actions::run_scheduled_crawl;
use super::outcome::CrawlReport;
use crate::common::time::utc_now;
use crate::kernel::jobs::HandlerRegistry;
use crate::kernel::WorkerDeps;

/// Arguments of the `run_scheduled_crawl` handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunScheduledCrawlJob {
    pub scheduled_crawl_id: Uuid,
}

impl RunScheduledCrawlJob {
    pub const HANDLER: &'static str = "run_scheduled_crawl";

    pub fn new(scheduled_crawl_id: Uuid) -> Self {
        Self { scheduled_crawl_id }
    }
}

async fn handle_run_scheduled_crawl(job: RunScheduledCrawlJob, deps: Arc<WorkerDeps>) -> Result<CrawlReport> {
    run_scheduled_crawl(&deps, job.scheduled_crawl_id, utc_now()).await
}

pub fn register(registry: &mut HandlerRegistry) {
    registry.register(RunScheduledCrawlJob::HANDLER, handle_run_scheduled_crawl);
}
