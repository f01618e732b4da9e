//! Core configuration types for a crawl run
//!
//! `RunConfig` holds run-wide settings; every site to crawl gets its own
//! `CrawlerConfig` so sites can be tuned independently.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::crawl_engine::retry_policy::BackoffScale;
use crate::utils::{DEFAULT_DETAIL_ATTEMPTS, DEFAULT_MAX_CONCURRENCY, DEFAULT_SWEEP_ATTEMPTS};

/// Main configuration struct for one crawl run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory holding persisted batches.
    ///
    /// **INVARIANT:** Always an absolute path (normalized in builder).
    pub(crate) output_dir: PathBuf,
    pub(crate) crawlers: Vec<CrawlerConfig>,
    /// Merge the previous batch into the new one before saving
    pub(crate) consolidate: bool,
    pub(crate) headless: bool,
    pub(crate) anti_detection: bool,
    pub(crate) user_agent: Option<String>,

    /// Timeout in seconds for a single page load
    ///
    /// Default: 30 seconds
    pub(crate) page_load_timeout_secs: u64,

    /// Timeout in seconds for a listing or detail content marker to appear
    ///
    /// Default: 10 seconds
    pub(crate) selector_timeout_secs: u64,

    /// Timeout in seconds for plain HTTP detail fetches
    pub(crate) http_timeout_secs: u64,

    /// Upper bound on listing pages per site
    pub(crate) max_pages: u32,

    /// Number of tags reported in the run summary
    pub(crate) top_tags: usize,
}

/// Per-site crawl settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Site name as known to [`crate::sites::by_name`]
    pub site: String,
    /// Pool capacity and listing workers
    pub max_concurrency: usize,
    /// First-pass detail concurrency; defaults to `max_concurrency`
    pub detail_concurrency: Option<usize>,
    /// Detail attempts per candidate in the first pass
    pub max_attempts: u32,
    /// Base delay between detail attempts
    pub retry_delay_ms: u64,
    pub backoff: BackoffScale,
    /// Detail attempts per candidate in the retry sweep
    pub sweep_attempts: u32,
}

impl CrawlerConfig {
    #[must_use]
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            detail_concurrency: None,
            max_attempts: DEFAULT_DETAIL_ATTEMPTS,
            retry_delay_ms: 2_000,
            backoff: BackoffScale::Linear,
            sweep_attempts: DEFAULT_SWEEP_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    #[must_use]
    pub fn detail_concurrency(mut self, workers: usize) -> Self {
        self.detail_concurrency = Some(workers);
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn backoff(mut self, scale: BackoffScale) -> Self {
        self.backoff = scale;
        self
    }

    #[must_use]
    pub fn sweep_attempts(mut self, attempts: u32) -> Self {
        self.sweep_attempts = attempts;
        self
    }
}
