// Scheduled Crawl Ingestion Worker - Core
//
// Recurring crawl configurations are materialized into jobs, claimed with a
// compare-and-set on the job row, and executed against the extraction
// library. The binary in src/worker wires it together.

pub mod common;
pub mod config;
pub mod domains;
pub mod error;
pub mod kernel;
pub mod operator;
pub mod store;

pub use config::*;
