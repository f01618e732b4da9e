//! Configuration module for crawl runs
//!
//! This module provides the `RunConfig` struct and its type-safe builder
//! plus the per-site `CrawlerConfig`.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{MAX_CRAWLER_CONCURRENCY, MAX_DETAIL_ATTEMPTS, RunConfigBuilder, WithOutputDir};
pub use types::{CrawlerConfig, RunConfig};
