//! Core trait abstractions for the extraction library.
//!
//! The crawl engine only depends on these traits, so tests can swap the
//! network out for canned pages.

pub mod fetcher;
