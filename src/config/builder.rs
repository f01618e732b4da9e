//! Type-safe builder for `RunConfig` using the typestate pattern
//!
//! `build()` only exists once the output directory is set; value ranges are
//! checked when building.

use anyhow::{Context, Result, anyhow, bail};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::{CrawlerConfig, RunConfig};
use crate::sites;
use crate::utils::{DEFAULT_MAX_PAGES, DEFAULT_SELECTOR_TIMEOUT, DEFAULT_HTTP_TIMEOUT, DEFAULT_PAGE_LOAD_TIMEOUT};

/// Largest pool a single crawler may open
pub const MAX_CRAWLER_CONCURRENCY: usize = 32;

/// Largest per-candidate attempt budget
pub const MAX_DETAIL_ATTEMPTS: u32 = 10;

// Type states for the builder
pub struct WithOutputDir;

pub struct RunConfigBuilder<State = ()> {
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) crawlers: Vec<CrawlerConfig>,
    pub(crate) consolidate: bool,
    pub(crate) headless: bool,
    pub(crate) anti_detection: bool,
    pub(crate) user_agent: Option<String>,
    pub(crate) page_load_timeout_secs: u64,
    pub(crate) selector_timeout_secs: u64,
    pub(crate) http_timeout_secs: u64,
    pub(crate) max_pages: u32,
    pub(crate) top_tags: usize,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for RunConfigBuilder<()> {
    fn default() -> Self {
        Self {
            output_dir: None,
            crawlers: Vec::new(),
            consolidate: true,
            headless: true,
            anti_detection: true,
            user_agent: None,
            page_load_timeout_secs: DEFAULT_PAGE_LOAD_TIMEOUT.as_secs(),
            selector_timeout_secs: DEFAULT_SELECTOR_TIMEOUT.as_secs(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            max_pages: DEFAULT_MAX_PAGES,
            top_tags: 10,
            _phantom: PhantomData,
        }
    }
}

impl RunConfig {
    /// Create a builder for configuring a `RunConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> RunConfigBuilder<()> {
        RunConfigBuilder::default()
    }
}

impl RunConfigBuilder<()> {
    pub fn output_dir(self, dir: impl Into<PathBuf>) -> RunConfigBuilder<WithOutputDir> {
        RunConfigBuilder {
            output_dir: Some(dir.into()),
            crawlers: self.crawlers,
            consolidate: self.consolidate,
            headless: self.headless,
            anti_detection: self.anti_detection,
            user_agent: self.user_agent,
            page_load_timeout_secs: self.page_load_timeout_secs,
            selector_timeout_secs: self.selector_timeout_secs,
            http_timeout_secs: self.http_timeout_secs,
            max_pages: self.max_pages,
            top_tags: self.top_tags,
            _phantom: PhantomData,
        }
    }
}

fn validate_crawler(crawler: &CrawlerConfig) -> Result<()> {
    if sites::by_name(&crawler.site).is_none() {
        bail!("unknown site '{}'", crawler.site);
    }
    if !(1..=MAX_CRAWLER_CONCURRENCY).contains(&crawler.max_concurrency) {
        bail!(
            "{}: max_concurrency must be between 1 and {MAX_CRAWLER_CONCURRENCY}, got {}",
            crawler.site,
            crawler.max_concurrency
        );
    }
    if let Some(detail) = crawler.detail_concurrency
        && !(1..=MAX_CRAWLER_CONCURRENCY).contains(&detail)
    {
        bail!("{}: detail_concurrency out of range: {detail}", crawler.site);
    }
    if !(1..=MAX_DETAIL_ATTEMPTS).contains(&crawler.max_attempts) {
        bail!(
            "{}: max_attempts must be between 1 and {MAX_DETAIL_ATTEMPTS}, got {}",
            crawler.site,
            crawler.max_attempts
        );
    }
    if crawler.sweep_attempts > MAX_DETAIL_ATTEMPTS {
        bail!("{}: sweep_attempts out of range: {}", crawler.site, crawler.sweep_attempts);
    }
    Ok(())
}

// Build method only available when all required fields are set
impl RunConfigBuilder<WithOutputDir> {
    pub fn build(self) -> Result<RunConfig> {
        let output_dir = self
            .output_dir
            .ok_or_else(|| anyhow!("output_dir is required"))?;
        let output_dir = if output_dir.is_absolute() {
            output_dir
        } else {
            std::env::current_dir()
                .context("resolving relative output_dir")?
                .join(output_dir)
        };

        // No explicit crawler list means every built-in site
        let crawlers = if self.crawlers.is_empty() {
            sites::all()
                .into_iter()
                .map(|site| CrawlerConfig::new(site.name))
                .collect()
        } else {
            self.crawlers
        };
        for crawler in &crawlers {
            validate_crawler(crawler)?;
        }
        let mut seen = std::collections::HashSet::new();
        for crawler in &crawlers {
            if !seen.insert(crawler.site.to_ascii_lowercase()) {
                bail!("site '{}' configured twice", crawler.site);
            }
        }

        if self.page_load_timeout_secs == 0
            || self.selector_timeout_secs == 0
            || self.http_timeout_secs == 0
        {
            bail!("timeouts must be at least one second");
        }
        if self.max_pages == 0 {
            bail!("max_pages must be at least 1");
        }

        Ok(RunConfig {
            output_dir,
            crawlers,
            consolidate: self.consolidate,
            headless: self.headless,
            anti_detection: self.anti_detection,
            user_agent: self.user_agent,
            page_load_timeout_secs: self.page_load_timeout_secs,
            selector_timeout_secs: self.selector_timeout_secs,
            http_timeout_secs: self.http_timeout_secs,
            max_pages: self.max_pages,
            top_tags: self.top_tags,
        })
    }
}
