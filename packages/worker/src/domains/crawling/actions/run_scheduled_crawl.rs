use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::domains::crawling::executor::CrawlRequest;
use crate::domains::crawling::outcome::CrawlReport;
use crate::kernel::WorkerDeps;

/// Run one scheduled crawl now, outside its cadence.
///
/// Records `last_run_at` but leaves `next_run_at` alone. A crawl-level
/// failure is returned as an error after the run is recorded.
pub async fn run_scheduled_crawl(deps: &WorkerDeps, id: Uuid, now: DateTime<Utc>) -> Result<CrawlReport> {
    let crawl = deps
        .scheduled_crawls
        .get_scheduled_crawl(id)
        .await?
        .ok_or_else(|| anyhow!("scheduled crawl not found: {}", id))?;

    info!(scheduled_crawl_id = %id, url = %crawl.source_url, "Running scheduled crawl on demand");
    let report = deps.executor().execute(&CrawlRequest::from_scheduled(&crawl)).await;

    deps.scheduled_crawls
        .record_scheduled_crawl_run(id, now, None)
        .await?;

    if let Some(message) = report.crawl_error() {
        bail!("{}", message);
    }
    Ok(report)
}
