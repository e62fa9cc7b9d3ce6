pub mod actions;
pub mod executor;
pub mod jobs;
pub mod models;
pub mod outcome;
pub mod planner;

pub use executor::{CrawlError, CrawlExecutor, CrawlRequest, ExecutorConfig};
pub use jobs::RunScheduledCrawlJob;
pub use outcome::{CrawlOutcome, CrawlReport, OutcomeStatus};
pub use planner::{plan_chapters, CrawlScope, PlanError};
