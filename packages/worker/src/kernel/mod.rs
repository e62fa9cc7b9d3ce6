pub mod deps;
pub mod jobs;
pub mod scheduler;

pub use deps::WorkerDeps;
pub use scheduler::{CompactionSummary, Scheduler, SchedulerConfig, SchedulerLoops};
