//! Crawl Engine Module
//!
//! Site-agnostic orchestration of the two crawl phases. The listing phase
//! enumerates candidate URLs, the detail phase turns the unseen ones into
//! records. Both share the session pool and the bounded dispatcher.

pub mod crawl_types;
pub mod detail;
pub mod dispatch;
pub mod listing;
pub mod partition;
pub mod progress;
pub mod retry_policy;

pub use crawl_types::{CrawlError, CrawlResult, FailureKind};
pub use detail::{DetailOptions, DetailOutcome, browser_like_client, fetch_details};
pub use dispatch::{TaskOutcome, run_bounded};
pub use listing::{ListingOptions, collect_candidates};
pub use partition::chunk_pages;
pub use progress::{CounterSnapshot, CrawlCounters};
pub use retry_policy::{BackoffScale, RetryPolicy};
