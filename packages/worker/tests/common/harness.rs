//! Test harness for integration testing.
//!
//! Each test gets a fresh in-memory SQLite store, a mock fetcher serving
//! canned pages, and the scheduler loops wired to both. Loops are driven by
//! calling them with an explicit `now`; the cron timer is never started.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use test_context::AsyncTestContext;
use uuid::Uuid;

use extraction::{FetchResult, MockFetcher, PageFetcher};
use worker_core::domains::build_handler_registry;
use worker_core::domains::crawling::models::ScheduledCrawl;
use worker_core::kernel::jobs::{Job, JobStatus};
use worker_core::kernel::{Scheduler, SchedulerConfig, SchedulerLoops, WorkerDeps};
use worker_core::operator::OperatorService;
use worker_core::store::{JobStore, ScheduledCrawlStore, SqliteStore};

/// Fetcher whose every call panics, for exercising task isolation.
pub struct PanickingFetcher;

#[async_trait::async_trait]
impl PageFetcher for PanickingFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<String> {
        panic!("fetcher blew up on {}", url)
    }
}

pub struct TestHarness {
    pub store: Arc<SqliteStore>,
    pub fetcher: MockFetcher,
    pub deps: Arc<WorkerDeps>,
    pub loops: Arc<SchedulerLoops>,
    pub operator: OperatorService,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        // In-memory database goes away with the pool
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        Self::with_config(SchedulerConfig::default()).await
    }

    pub async fn with_config(config: SchedulerConfig) -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let store = Arc::new(
            SqliteStore::in_memory()
                .await
                .context("Failed to open in-memory store")?,
        );
        let fetcher = MockFetcher::new();
        let deps = Arc::new(WorkerDeps::new(store.clone(), Arc::new(fetcher.clone())));

        let scheduler = Scheduler::new(deps.clone(), Arc::new(build_handler_registry()), config);
        let loops = scheduler.loops().clone();
        let operator = OperatorService::new(deps.clone());

        Ok(Self {
            store,
            fetcher,
            deps,
            loops,
            operator,
        })
    }

    /// The harness dependencies with a different fetcher.
    pub fn deps_with_fetcher(&self, fetcher: Arc<dyn PageFetcher>) -> Arc<WorkerDeps> {
        Arc::new(WorkerDeps {
            fetcher,
            ..(*self.deps).clone()
        })
    }

    /// Scheduler loops over `deps` with the production handler registry.
    pub fn loops_for(&self, deps: Arc<WorkerDeps>) -> SchedulerLoops {
        SchedulerLoops::new(deps, Arc::new(build_handler_registry()), SchedulerConfig::default())
    }

    pub async fn job(&self, id: Uuid) -> Job {
        self.store
            .get_job(id)
            .await
            .expect("Failed to load job")
            .expect("Job not found")
    }

    pub async fn job_status(&self, id: Uuid) -> JobStatus {
        self.job(id).await.status
    }

    pub async fn scheduled_crawl(&self, id: Uuid) -> ScheduledCrawl {
        self.store
            .get_scheduled_crawl(id)
            .await
            .expect("Failed to load scheduled crawl")
            .expect("Scheduled crawl not found")
    }

    /// Store a scheduled crawl that is already due at `now`.
    pub async fn insert_due_crawl(&self, mut crawl: ScheduledCrawl, now: DateTime<Utc>) -> ScheduledCrawl {
        crawl.next_run_at = now - chrono::Duration::minutes(1);
        self.store
            .insert_scheduled_crawl(&crawl)
            .await
            .expect("Failed to insert scheduled crawl");
        crawl
    }
}
