use anyhow::{Context, Result};
use dotenvy::dotenv;
use extraction::FetchConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::crawling::executor::ExecutorConfig;
use crate::kernel::SchedulerConfig;

/// Worker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub materialize_cron: String,
    pub dispatch_cron: String,
    pub reap_cron: String,
    pub compact_cron: String,
    pub max_execution_secs: i64,
    pub completed_retention_days: i64,
    pub failed_retention_days: i64,
    pub dispatch_batch_size: i64,
    pub crawl_batch_size: usize,
    pub fetch_connect_timeout_secs: u64,
    pub fetch_read_timeout_secs: u64,
    pub fetch_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://crawl-worker.db?mode=rwc".to_string(),
            materialize_cron: "0 */5 * * * *".to_string(),
            dispatch_cron: "0 * * * * *".to_string(),
            reap_cron: "30 */5 * * * *".to_string(),
            compact_cron: "0 0 * * * *".to_string(),
            max_execution_secs: 7200,
            completed_retention_days: 7,
            failed_retention_days: 30,
            dispatch_batch_size: 20,
            crawl_batch_size: 50,
            fetch_connect_timeout_secs: 10,
            fetch_read_timeout_secs: 30,
            fetch_max_attempts: 3,
        }
    }
}

fn var_or(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();
        Ok(Self {
            database_url: var_or("DATABASE_URL", defaults.database_url),
            materialize_cron: var_or("MATERIALIZE_CRON", defaults.materialize_cron),
            dispatch_cron: var_or("DISPATCH_CRON", defaults.dispatch_cron),
            reap_cron: var_or("REAP_CRON", defaults.reap_cron),
            compact_cron: var_or("COMPACT_CRON", defaults.compact_cron),
            max_execution_secs: parse_var("MAX_EXECUTION_SECS", defaults.max_execution_secs)?,
            completed_retention_days: parse_var(
                "COMPLETED_RETENTION_DAYS",
                defaults.completed_retention_days,
            )?,
            failed_retention_days: parse_var("FAILED_RETENTION_DAYS", defaults.failed_retention_days)?,
            dispatch_batch_size: parse_var("DISPATCH_BATCH_SIZE", defaults.dispatch_batch_size)?,
            crawl_batch_size: parse_var("CRAWL_BATCH_SIZE", defaults.crawl_batch_size)?,
            fetch_connect_timeout_secs: parse_var(
                "FETCH_CONNECT_TIMEOUT_SECS",
                defaults.fetch_connect_timeout_secs,
            )?,
            fetch_read_timeout_secs: parse_var("FETCH_READ_TIMEOUT_SECS", defaults.fetch_read_timeout_secs)?,
            fetch_max_attempts: parse_var("FETCH_MAX_ATTEMPTS", defaults.fetch_max_attempts)?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_crons(
                &self.materialize_cron,
                &self.dispatch_cron,
                &self.reap_cron,
                &self.compact_cron,
            )
            .with_max_execution(chrono::Duration::seconds(self.max_execution_secs))
            .with_retention(
                chrono::Duration::days(self.completed_retention_days),
                chrono::Duration::days(self.failed_retention_days),
            )
            .with_dispatch_batch_size(self.dispatch_batch_size)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::default()
            .with_connect_timeout(Duration::from_secs(self.fetch_connect_timeout_secs))
            .with_read_timeout(Duration::from_secs(self.fetch_read_timeout_secs))
            .with_max_attempts(self.fetch_max_attempts)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default().with_batch_size(self.crawl_batch_size)
    }
}
