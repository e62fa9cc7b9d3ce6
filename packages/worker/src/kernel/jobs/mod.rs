pub mod dispatcher;
pub mod job;
pub mod manager;
pub mod registry;

pub use dispatcher::{DispatchSummary, JobDispatcher, JobRunOutcome};
pub use job::{
    recurring_check_dedupe_key, Job, JobCounts, JobFilter, JobStatus, JobType, NewJob,
    SingleJobOptions, CANCELED_MESSAGE, DEFAULT_MAX_RETRIES, LOCK_EXPIRED_MESSAGE,
};
pub use manager::{schedule_job, JobManager};
pub use registry::{HandlerRegistry, SharedHandlerRegistry};
