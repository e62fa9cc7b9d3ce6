use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domains::crawling::executor::CrawlRequest;
use crate::domains::crawling::outcome::CrawlReport;
use crate::kernel::WorkerDeps;

/// Result of one scheduled crawl inside a recurring check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCrawlRunSummary {
    pub scheduled_crawl_id: Uuid,
    pub source_url: String,
    pub report: CrawlReport,
    /// Set when the crawl aborted or its run could not be recorded
    pub error: Option<String>,
    pub next_run_at: DateTime<Utc>,
}

/// Result of a `recurring_crawl_check` job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DueCrawlReport {
    pub configs_due: usize,
    pub configs_run: usize,
    pub runs: Vec<ScheduledCrawlRunSummary>,
}

/// Run every active scheduled crawl due by `now`, oldest `next_run_at` first.
///
/// Each crawl is rescheduled from `now` before it runs, whether or not it
/// then succeeds. The reschedule is a compare-and-set on the `next_run_at`
/// that made it due, so overlapping checks run a crawl at most once. A
/// failing crawl never stops the ones after it.
pub async fn run_due_crawls(deps: &WorkerDeps, now: DateTime<Utc>) -> Result<DueCrawlReport> {
    let due = deps
        .scheduled_crawls
        .find_due_scheduled_crawls(now)
        .await
        .context("failed to load due scheduled crawls")?;

    let mut report = DueCrawlReport {
        configs_due: due.len(),
        ..Default::default()
    };
    if due.is_empty() {
        return Ok(report);
    }

    info!(count = due.len(), "Running due scheduled crawls");
    let executor = deps.executor();

    for crawl in due {
        let next_run_at = crawl.cadence.next_after(now);

        match deps
            .scheduled_crawls
            .advance_scheduled_crawl(crawl.id, crawl.next_run_at, next_run_at, now)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(scheduled_crawl_id = %crawl.id, "Scheduled crawl taken by another check");
                continue;
            }
            Err(e) => {
                error!(scheduled_crawl_id = %crawl.id, error = %e, "Failed to reschedule scheduled crawl");
                continue;
            }
        }

        let crawl_report = executor.execute(&CrawlRequest::from_scheduled(&crawl)).await;
        let mut error_message = crawl_report.crawl_error().map(str::to_string);
        report.configs_run += 1;

        if let Err(e) = deps
            .scheduled_crawls
            .record_scheduled_crawl_run(crawl.id, now, None)
            .await
        {
            error!(scheduled_crawl_id = %crawl.id, error = %e, "Failed to record scheduled crawl run");
            error_message.get_or_insert_with(|| format!("failed to record run: {}", e));
        }

        report.runs.push(ScheduledCrawlRunSummary {
            scheduled_crawl_id: crawl.id,
            source_url: crawl.source_url,
            report: crawl_report,
            error: error_message,
            next_run_at,
        });
    }

    Ok(report)
}
