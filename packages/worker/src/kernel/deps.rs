//! Worker dependencies shared by job handlers and scheduler loops.
//!
//! Every external collaborator sits behind a trait object so tests can
//! swap in `MemoryStore` and `MockFetcher`.

use extraction::PageFetcher;
use std::sync::Arc;

use crate::domains::crawling::executor::{CrawlExecutor, ExecutorConfig};
use crate::store::{CatalogStore, JobStore, ScheduledCrawlStore};

#[derive(Clone)]
pub struct WorkerDeps {
    pub jobs: Arc<dyn JobStore>,
    pub scheduled_crawls: Arc<dyn ScheduledCrawlStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub executor_config: ExecutorConfig,
}

impl WorkerDeps {
    /// Use one store for all three persistence roles.
    pub fn new<S>(store: Arc<S>, fetcher: Arc<dyn PageFetcher>) -> Self
    where
        S: JobStore + ScheduledCrawlStore + CatalogStore + 'static,
    {
        Self {
            jobs: store.clone(),
            scheduled_crawls: store.clone(),
            catalog: store,
            fetcher,
            executor_config: ExecutorConfig::default(),
        }
    }

    pub fn with_executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor_config = config;
        self
    }

    pub fn executor(&self) -> CrawlExecutor {
        CrawlExecutor::new(
            self.fetcher.clone(),
            self.catalog.clone(),
            self.executor_config.clone(),
        )
    }
}
