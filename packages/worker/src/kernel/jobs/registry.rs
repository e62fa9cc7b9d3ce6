//! Handler registry for `single_job` work.
//!
//! Maps handler ids (e.g. "run_scheduled_crawl") to async functions with
//! typed arguments and results. JSON is only the storage form: the
//! registry decodes `args` before calling the handler and encodes its result.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::kernel::WorkerDeps;

type BoxedHandler = Box<
    dyn Fn(serde_json::Value, Arc<WorkerDeps>) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

/// Registry of deferred-execution handlers.
///
/// ```
/// use std::sync::Arc;
/// use anyhow::Result;
/// use worker_core::common::utc_now;
/// use worker_core::domains::crawling::actions::run_scheduled_crawl;
/// use worker_core::domains::crawling::{CrawlReport, RunScheduledCrawlJob};
/// use worker_core::kernel::jobs::HandlerRegistry;
/// use worker_core::kernel::WorkerDeps;
///
/// async fn handle_run_scheduled_crawl(job: RunScheduledCrawlJob, deps: Arc<WorkerDeps>) -> Result<CrawlReport> {
///     run_scheduled_crawl(&deps, job.scheduled_crawl_id, utc_now()).await
/// }
///
/// let mut registry = HandlerRegistry::new();
/// registry.register(RunScheduledCrawlJob::HANDLER, handle_run_scheduled_crawl);
/// assert!(registry.is_registered(RunScheduledCrawlJob::HANDLER));
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, BoxedHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler. Re-registering an id replaces the previous handler.
    pub fn register<A, R, F, Fut>(&mut self, handler_id: &'static str, handler: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A, Arc<WorkerDeps>) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let boxed: BoxedHandler = Box::new(move |value, deps| {
            let handler = handler.clone();
            Box::pin(async move {
                let args: A = serde_json::from_value(value)
                    .map_err(|e| anyhow!("invalid args for {}: {}", handler_id, e))?;
                let result = handler(args, deps).await?;
                Ok(serde_json::to_value(result)?)
            })
        });

        self.handlers.insert(handler_id, boxed);
    }

    /// Run the handler registered under `handler_id`.
    pub async fn execute(
        &self,
        handler_id: &str,
        args: serde_json::Value,
        deps: Arc<WorkerDeps>,
    ) -> Result<serde_json::Value> {
        let handler = self
            .handlers
            .get(handler_id)
            .ok_or_else(|| anyhow!("unknown handler: {}", handler_id))?;

        handler(args, deps).await
    }

    pub fn is_registered(&self, handler_id: &str) -> bool {
        self.handlers.contains_key(handler_id)
    }

    pub fn registered_handlers(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

pub type SharedHandlerRegistry = Arc<HandlerRegistry>;
