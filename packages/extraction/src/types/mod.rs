//! Data types shared by the fetcher and the site extractors.

pub mod chapter;
pub mod config;
pub mod series;
