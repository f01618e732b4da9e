//! Job data model and HTML extraction helpers.

pub mod extractors;
pub mod schema;

pub use extractors::{ExtractError, ExtractResult};
pub use schema::{BatchMetadata, CandidateUrl, CrawlBatch, JobRecord, parse_timestamp};
