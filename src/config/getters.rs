//! Getter methods for `RunConfig`
//!
//! Besides plain accessors this module derives the option structs each
//! component takes, so components never read `RunConfig` directly.

use std::path::Path;
use std::time::Duration;

use super::types::{CrawlerConfig, RunConfig};
use crate::crawl_engine::{DetailOptions, ListingOptions, RetryPolicy};
use crate::session::SessionOptions;
use crate::sites::{self, SiteProfile};

impl RunConfig {
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn crawlers(&self) -> &[CrawlerConfig] {
        &self.crawlers
    }

    #[must_use]
    pub fn consolidate(&self) -> bool {
        self.consolidate
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn anti_detection(&self) -> bool {
        self.anti_detection
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    #[must_use]
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    #[must_use]
    pub fn selector_timeout(&self) -> Duration {
        Duration::from_secs(self.selector_timeout_secs)
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    #[must_use]
    pub fn top_tags(&self) -> usize {
        self.top_tags
    }

    /// Launch options shared by every session of the run
    #[must_use]
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            headless: self.headless,
            user_agent: self.user_agent.clone(),
            anti_detection: self.anti_detection,
            page_load_timeout: self.page_load_timeout(),
            ..SessionOptions::default()
        }
    }

    #[must_use]
    pub fn listing_options(&self, crawler: &CrawlerConfig) -> ListingOptions {
        ListingOptions {
            workers: crawler.max_concurrency,
            max_pages: self.max_pages,
            selector_timeout: self.selector_timeout(),
            ..ListingOptions::default()
        }
    }

    #[must_use]
    pub fn detail_options(&self, crawler: &CrawlerConfig) -> DetailOptions {
        // Capped at the pool size
        let concurrency = crawler
            .detail_concurrency
            .unwrap_or(crawler.max_concurrency)
            .min(crawler.max_concurrency);
        DetailOptions {
            concurrency,
            retry: crawler.retry_policy(),
            sweep_attempts: crawler.sweep_attempts,
            selector_timeout: self.selector_timeout(),
            page_load_timeout: self.page_load_timeout(),
            http_timeout: self.http_timeout(),
            ..DetailOptions::default()
        }
    }
}

impl CrawlerConfig {
    /// First-pass detail retry schedule
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            scale: self.backoff,
        }
    }

    /// The site this crawler targets; always `Some` for a built config
    #[must_use]
    pub fn site_profile(&self) -> Option<SiteProfile> {
        sites::by_name(&self.site)
    }
}
