//! Listing phase: enumerate candidate detail URLs across a site's pages.
//!
//! The entry page is read once to learn the page count, the page range is
//! split into contiguous chunks, and each chunk is walked by one worker with
//! its own pooled session.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use super::crawl_types::{CrawlError, CrawlResult};
use super::dispatch::{TaskOutcome, run_bounded};
use super::partition::chunk_pages;
use super::progress::CrawlCounters;
use crate::browser_pool::{PooledSession, SessionPool};
use crate::page_extractor::schema::CandidateUrl;
use crate::session::{BrowserSession, NavigateOptions, SessionFactory, try_navigate};
use crate::sites::SiteProfile;
use crate::utils::{
    DEFAULT_CHUNK_TIMEOUT, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_PAGES, DEFAULT_MAX_SCROLL_ROUNDS,
    DEFAULT_SCROLL_DELAY, DEFAULT_SELECTOR_TIMEOUT, dedup_preserving_order,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingOptions {
    /// Number of chunk workers
    pub workers: usize,
    /// Clamp for the page count read from pagination
    pub max_pages: u32,
    pub selector_timeout: Duration,
    /// Deadline for one chunk; a chunk over it contributes nothing
    pub chunk_timeout: Duration,
    pub scroll_delay: Duration,
    pub max_scroll_rounds: u32,
    #[serde(skip)]
    pub navigate: NavigateOptions,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_MAX_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
            selector_timeout: DEFAULT_SELECTOR_TIMEOUT,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            scroll_delay: DEFAULT_SCROLL_DELAY,
            max_scroll_rounds: DEFAULT_MAX_SCROLL_ROUNDS,
            navigate: NavigateOptions::default(),
        }
    }
}

impl ListingOptions {
    /// Navigation for listing pages: challenge handling only where the site needs it
    fn page_navigation(&self, site: &SiteProfile) -> NavigateOptions {
        NavigateOptions {
            challenge_bypass: self.navigate.challenge_bypass && site.challenge_bypass,
            ..self.navigate.clone()
        }
    }
}

/// Collect every candidate URL the site currently lists.
///
/// Fails only when the entry page cannot be reached. Individual page
/// failures are logged, counted and skipped.
pub async fn collect_candidates<F: SessionFactory>(
    pool: &Arc<SessionPool<F>>,
    site: &SiteProfile,
    options: &ListingOptions,
    counters: &Arc<CrawlCounters>,
) -> CrawlResult<Vec<CandidateUrl>> {
    let entry = pool.acquire().await?;

    let html = match read_entry_page(entry.session(), site, options).await {
        Ok(html) => html,
        Err(e) => {
            if e.is_session_fatal() {
                pool.on_error(entry);
            } else {
                pool.release(entry);
            }
            return Err(CrawlError::SiteUnreachable(format!("{}: {e}", site.base_url)));
        }
    };
    pool.release(entry);

    if site.infinite_scroll {
        let candidates = (site.parse_listing)(&html)?;
        counters.page_crawled(candidates.len());
        info!("{}: {} candidates from scrolled listing", site.name, candidates.len());
        return Ok(dedup_preserving_order(candidates));
    }

    let total_pages = (site.parse_total_pages)(&html)
        .unwrap_or(1)
        .clamp(1, options.max_pages.max(1));
    let chunks = chunk_pages(total_pages, options.workers);
    info!(
        "{}: {total_pages} listing pages across {} workers",
        site.name,
        chunks.len()
    );

    let found = Arc::new(Mutex::new(Vec::new()));
    let shared_options = Arc::new(options.clone());
    let site = *site;

    let outcomes = run_bounded(chunks, options.workers, options.chunk_timeout, |pages| {
        let pool = Arc::clone(pool);
        let options = Arc::clone(&shared_options);
        let counters = Arc::clone(counters);
        let found = Arc::clone(&found);
        async move {
            let candidates = crawl_chunk(&pool, &site, &options, &counters, pages).await;
            let count = candidates.len();
            found.lock().extend(candidates);
            count
        }
    })
    .await;

    for (pages, outcome) in outcomes {
        match outcome {
            TaskOutcome::Completed(count) => {
                debug!("{}: pages {pages:?} yielded {count} candidates", site.name);
            }
            TaskOutcome::TimedOut => {
                counters.error();
                error!("{}: chunk {pages:?} exceeded {:?}", site.name, options.chunk_timeout);
            }
            TaskOutcome::Panicked(msg) => {
                counters.error();
                error!("{}: chunk {pages:?} panicked: {msg}", site.name);
            }
        }
    }

    let candidates = std::mem::take(&mut *found.lock());
    let candidates = dedup_preserving_order(candidates);
    info!("{}: {} unique candidates", site.name, candidates.len());
    Ok(candidates)
}

async fn read_entry_page<S: BrowserSession>(
    session: &S,
    site: &SiteProfile,
    options: &ListingOptions,
) -> CrawlResult<String> {
    try_navigate(session, site.base_url, &options.page_navigation(site)).await?;

    if site.infinite_scroll {
        let rounds = session
            .scroll_to_bottom(options.scroll_delay, options.max_scroll_rounds)
            .await?;
        debug!("{}: scrolled {rounds} rounds", site.name);
    }
    if let Err(e) = session
        .wait_for_selector(site.listing_selector, options.selector_timeout)
        .await
    {
        warn!("{}: listing selector not found on entry page: {e}", site.name);
    }

    Ok(session.content().await?)
}

/// Walk one contiguous page range with a single session, replacing it when it breaks
async fn crawl_chunk<F: SessionFactory>(
    pool: &Arc<SessionPool<F>>,
    site: &SiteProfile,
    options: &ListingOptions,
    counters: &CrawlCounters,
    pages: RangeInclusive<u32>,
) -> Vec<CandidateUrl> {
    let navigate = options.page_navigation(site);
    let mut found = Vec::new();
    let mut guard: Option<PooledSession<F>> = None;

    for page in pages {
        if guard.is_none() {
            match pool.acquire().await {
                Ok(acquired) => guard = Some(acquired),
                Err(e) => {
                    warn!("{}: no session for page {page}: {e}", site.name);
                    counters.page_failed();
                    continue;
                }
            }
        }
        let Some(current) = guard.as_ref() else {
            continue;
        };

        match crawl_page(current.session(), site, options, &navigate, page).await {
            Ok(candidates) => {
                debug!("{}: page {page} -> {} candidates", site.name, candidates.len());
                counters.page_crawled(candidates.len());
                found.extend(candidates);
            }
            Err(e) => {
                warn!("{}: page {page} failed: {e}", site.name);
                counters.page_failed();
                if e.is_session_fatal()
                    && let Some(broken) = guard.take()
                {
                    pool.on_error(broken);
                }
            }
        }
    }

    if let Some(current) = guard {
        pool.release(current);
    }
    found
}

async fn crawl_page<S: BrowserSession>(
    session: &S,
    site: &SiteProfile,
    options: &ListingOptions,
    navigate: &NavigateOptions,
    page: u32,
) -> CrawlResult<Vec<CandidateUrl>> {
    let url = (site.page_url)(page);
    try_navigate(session, &url, navigate).await?;
    session
        .wait_for_selector(site.listing_selector, options.selector_timeout)
        .await?;
    let html = session.content().await?;
    Ok((site.parse_listing)(&html)?)
}
