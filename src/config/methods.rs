//! Builder methods available for all states
//!
//! This module contains methods that can be called on the builder
//! regardless of its current type state.

use super::builder::RunConfigBuilder;
use super::types::CrawlerConfig;

impl<State> RunConfigBuilder<State> {
    /// Add one crawler; without any, every built-in site is crawled with defaults
    #[must_use]
    pub fn crawler(mut self, crawler: CrawlerConfig) -> Self {
        self.crawlers.push(crawler);
        self
    }

    #[must_use]
    pub fn crawlers(mut self, crawlers: impl IntoIterator<Item = CrawlerConfig>) -> Self {
        self.crawlers.extend(crawlers);
        self
    }

    /// Merge the previous batch into the saved one (default: true)
    ///
    /// With consolidation every saved batch is the full corpus seen so far,
    /// so the next run's diff covers all of it. Without it each batch holds
    /// only that run's new records.
    #[must_use]
    pub fn consolidate(mut self, consolidate: bool) -> Self {
        self.consolidate = consolidate;
        self
    }

    /// Run Chrome without a window (default: true)
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn anti_detection(mut self, enabled: bool) -> Self {
        self.anti_detection = enabled;
        self
    }

    /// Pin the user agent instead of picking one at random per session
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.page_load_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn selector_timeout_secs(mut self, secs: u64) -> Self {
        self.selector_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages;
        self
    }

    #[must_use]
    pub fn top_tags(mut self, n: usize) -> Self {
        self.top_tags = n;
        self
    }
}
