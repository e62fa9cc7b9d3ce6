mod run_due_crawls;
mod run_scheduled_crawl;

pub use run_due_crawls::{run_due_crawls, DueCrawlReport, ScheduledCrawlRunSummary};
pub use run_scheduled_crawl::run_scheduled_crawl;
