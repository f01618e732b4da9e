//! Detail phase: turn candidate URLs into job records.
//!
//! Every candidate runs through a small state machine driven by a
//! [`RetryPolicy`]. Candidates that exhaust their attempts in the first pass
//! get exactly one retry sweep at reduced concurrency and are dropped if they
//! fail again.

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, UPGRADE_INSECURE_REQUESTS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::crawl_types::{CrawlError, CrawlResult, FailureKind};
use super::dispatch::{TaskOutcome, run_bounded};
use super::progress::CrawlCounters;
use super::retry_policy::RetryPolicy;
use crate::browser_pool::SessionPool;
use crate::page_extractor::extractors::has_match;
use crate::page_extractor::schema::{CandidateUrl, JobRecord};
use crate::session::{BrowserSession, NavigateOptions, SessionFactory, try_navigate};
use crate::sites::{FetchStrategy, SiteProfile};
use crate::utils::{
    CHROME_USER_AGENT, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_CONCURRENCY, DEFAULT_PAGE_LOAD_TIMEOUT,
    DEFAULT_SELECTOR_TIMEOUT, DEFAULT_SWEEP_ATTEMPTS, DETAIL_SESSION_SLACK,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailOptions {
    /// Concurrent candidates in the first pass; the sweep uses half
    pub concurrency: usize,
    /// First-pass attempt budget and backoff
    pub retry: RetryPolicy,
    /// Attempts per candidate in the retry sweep
    pub sweep_attempts: u32,
    pub selector_timeout: Duration,
    /// Bound on a single `goto` in the sessions this phase uses
    pub page_load_timeout: Duration,
    /// Client timeout of the HTTP-first fetch
    pub http_timeout: Duration,
    #[serde(skip)]
    pub navigate: NavigateOptions,
}

impl Default for DetailOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
            sweep_attempts: DEFAULT_SWEEP_ATTEMPTS,
            selector_timeout: DEFAULT_SELECTOR_TIMEOUT,
            page_load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            navigate: NavigateOptions::default(),
        }
    }
}

impl DetailOptions {
    /// Bound on one browser fetch: navigation with all its retries plus the
    /// content selector wait
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        self.navigate
            .worst_case(self.page_load_timeout)
            .saturating_add(self.selector_timeout)
    }

    /// Join deadline for one candidate under `retry`
    ///
    /// Every attempt may run to its own timeout, plus the slowest backoff
    /// between attempts.
    #[must_use]
    pub fn task_deadline(&self, retry: &RetryPolicy) -> Duration {
        let per_attempt = self
            .http_timeout
            .saturating_add(DETAIL_SESSION_SLACK)
            .saturating_add(self.attempt_timeout());
        per_attempt
            .saturating_mul(retry.attempts())
            .saturating_add(retry.worst_case_delay().mul_f64(FailureKind::MAX_DELAY_MULTIPLIER))
    }

    fn sweep_concurrency(&self) -> usize {
        (self.concurrency / 2).max(1)
    }

    fn sweep_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.sweep_attempts.max(1),
            ..self.retry
        }
    }
}

/// Result of the detail phase for one site
#[derive(Debug, Default)]
pub struct DetailOutcome {
    pub records: Vec<JobRecord>,
    /// Candidates that failed the first pass and the retry sweep
    pub dropped: Vec<CandidateUrl>,
}

/// HTTP client that presents itself like a desktop browser
pub fn browser_like_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

    reqwest::Client::builder()
        .user_agent(CHROME_USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

struct DetailContext<F: SessionFactory> {
    pool: Arc<SessionPool<F>>,
    site: SiteProfile,
    options: DetailOptions,
    navigate: NavigateOptions,
    counters: Arc<CrawlCounters>,
    http: reqwest::Client,
    records: Mutex<Vec<JobRecord>>,
}

enum CandidateState {
    Pending { attempt: u32 },
    Succeeded(JobRecord),
    Failed(CrawlError),
}

/// Fetch and parse every candidate.
///
/// Never fails as a whole: candidates that cannot be fetched end up in
/// [`DetailOutcome::dropped`] and in the counters.
pub async fn fetch_details<F: SessionFactory>(
    pool: &Arc<SessionPool<F>>,
    site: &SiteProfile,
    candidates: Vec<CandidateUrl>,
    options: &DetailOptions,
    counters: &Arc<CrawlCounters>,
    http: &reqwest::Client,
) -> DetailOutcome {
    let candidates = dedup_by_url(candidates);
    if candidates.is_empty() {
        return DetailOutcome::default();
    }

    let ctx = Arc::new(DetailContext {
        pool: Arc::clone(pool),
        site: *site,
        options: options.clone(),
        navigate: NavigateOptions {
            challenge_bypass: options.navigate.challenge_bypass && site.challenge_bypass,
            ..options.navigate.clone()
        },
        counters: Arc::clone(counters),
        http: http.clone(),
        records: Mutex::new(Vec::new()),
    });

    info!("{}: fetching {} detail pages", site.name, candidates.len());
    let failed = run_pass(
        &ctx,
        candidates,
        options.concurrency,
        options.retry,
        options.task_deadline(&options.retry),
    )
    .await;

    let dropped = if failed.is_empty() {
        Vec::new()
    } else {
        let failed = dedup_by_url(failed);
        info!("{}: retry sweep over {} failed candidates", site.name, failed.len());
        run_pass(
            &ctx,
            failed,
            options.sweep_concurrency(),
            options.sweep_policy(),
            options.task_deadline(&options.sweep_policy()),
        )
        .await
    };

    if !dropped.is_empty() {
        counters.dropped(dropped.len());
        warn!("{}: dropped {} candidates after retry sweep", site.name, dropped.len());
    }

    let records = std::mem::take(&mut *ctx.records.lock());
    DetailOutcome { records, dropped }
}

/// One concurrent pass; returns the candidates that did not produce a record
async fn run_pass<F: SessionFactory>(
    ctx: &Arc<DetailContext<F>>,
    candidates: Vec<CandidateUrl>,
    concurrency: usize,
    retry: RetryPolicy,
    task_timeout: Duration,
) -> Vec<CandidateUrl> {
    let outcomes = run_bounded(candidates, concurrency, task_timeout, |candidate| {
        let ctx = Arc::clone(ctx);
        async move {
            match fetch_with_retry(&ctx, &candidate, retry).await {
                Ok(job) => {
                    ctx.counters.record_parsed();
                    ctx.records.lock().push(job);
                    true
                }
                Err(e) => {
                    warn!("Giving up on {} for this pass: {e}", candidate.url);
                    false
                }
            }
        }
    })
    .await;

    outcomes
        .into_iter()
        .filter_map(|(candidate, outcome)| match outcome {
            TaskOutcome::Completed(true) => None,
            TaskOutcome::Completed(false) => {
                ctx.counters.error();
                Some(candidate)
            }
            TaskOutcome::TimedOut => {
                ctx.counters.error();
                warn!("{} exceeded {task_timeout:?}", candidate.url);
                Some(candidate)
            }
            TaskOutcome::Panicked(msg) => {
                ctx.counters.error();
                error!("Task for {} panicked: {msg}", candidate.url);
                Some(candidate)
            }
        })
        .collect()
}

async fn fetch_with_retry<F: SessionFactory>(
    ctx: &DetailContext<F>,
    candidate: &CandidateUrl,
    retry: RetryPolicy,
) -> CrawlResult<JobRecord> {
    let attempts = retry.attempts();
    let mut state = CandidateState::Pending { attempt: 1 };

    loop {
        state = match state {
            CandidateState::Pending { attempt } => match fetch_once(ctx, candidate).await {
                Ok(job) => CandidateState::Succeeded(job),
                Err(e) if retry.should_retry(attempt) => {
                    let kind = FailureKind::classify(&e);
                    let delay = retry.delay_for(attempt).mul_f64(kind.delay_multiplier());
                    debug!(
                        "Attempt {attempt}/{attempts} for {} failed ({kind:?}): {e}; retrying in {delay:?}",
                        candidate.url
                    );
                    tokio::time::sleep(delay).await;
                    CandidateState::Pending {
                        attempt: attempt + 1,
                    }
                }
                Err(e) => CandidateState::Failed(e),
            },
            CandidateState::Succeeded(job) => return Ok(job),
            CandidateState::Failed(e) => return Err(e),
        };
    }
}

async fn fetch_once<F: SessionFactory>(
    ctx: &DetailContext<F>,
    candidate: &CandidateUrl,
) -> CrawlResult<JobRecord> {
    if ctx.site.fetch_strategy == FetchStrategy::HttpFirst {
        match fetch_over_http(&ctx.http, &ctx.site, candidate).await {
            Ok(job) => return Ok(job),
            Err(e) => debug!("HTTP fetch of {} unusable, using browser: {e}", candidate.url),
        }
    }

    let guard = ctx.pool.acquire().await?;
    let limit = ctx.options.attempt_timeout();
    let result = tokio::time::timeout(limit, fetch_in_browser(guard.session(), ctx, candidate))
        .await
        .unwrap_or_else(|_| {
            Err(CrawlError::Timeout(format!(
                "{} not fetched within {limit:?}",
                candidate.url
            )))
        });
    match &result {
        Err(e) if e.is_session_fatal() => ctx.pool.on_error(guard),
        _ => ctx.pool.release(guard),
    }
    result
}

async fn fetch_over_http(
    http: &reqwest::Client,
    site: &SiteProfile,
    candidate: &CandidateUrl,
) -> CrawlResult<JobRecord> {
    let response = http.get(&candidate.url).send().await?.error_for_status()?;
    let body = response.text().await?;
    if !has_match(&body, site.detail_selector)? {
        return Err(CrawlError::ParseError(format!(
            "'{}' not present in HTTP response",
            site.detail_selector
        )));
    }
    Ok((site.parse_detail)(&body, candidate)?)
}

async fn fetch_in_browser<S: BrowserSession, F: SessionFactory>(
    session: &S,
    ctx: &DetailContext<F>,
    candidate: &CandidateUrl,
) -> CrawlResult<JobRecord> {
    try_navigate(session, &candidate.url, &ctx.navigate).await?;
    session
        .wait_for_selector(ctx.site.detail_selector, ctx.options.selector_timeout)
        .await?;
    let html = session.content().await?;
    Ok((ctx.site.parse_detail)(&html, candidate)?)
}

fn dedup_by_url(candidates: Vec<CandidateUrl>) -> Vec<CandidateUrl> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_runs_at_half_concurrency_with_its_own_budget() {
        let options = DetailOptions {
            concurrency: 5,
            sweep_attempts: 0,
            ..DetailOptions::default()
        };
        assert_eq!(options.sweep_concurrency(), 2);
        assert_eq!(options.sweep_policy().attempts(), 1);
        assert_eq!(options.sweep_policy().base_delay, options.retry.base_delay);

        let single = DetailOptions {
            concurrency: 1,
            ..DetailOptions::default()
        };
        assert_eq!(single.sweep_concurrency(), 1);
    }

    #[test]
    fn task_deadline_covers_every_attempt_of_an_always_challenged_page() {
        let options = DetailOptions::default();
        let navigate = &options.navigate;
        // Slowest single navigation attempt plus the selector wait
        let nav_attempt = options.page_load_timeout
            + navigate.settle_wait
            + navigate.settle_jitter
            + navigate.challenge_wait;
        let attempt = nav_attempt * navigate.retry.attempts()
            + navigate.retry.worst_case_delay()
            + options.selector_timeout;
        assert_eq!(options.attempt_timeout(), attempt);

        let retry = options.retry;
        let needed = attempt * retry.attempts() + retry.worst_case_delay().mul_f64(3.0);
        assert!(options.task_deadline(&retry) >= needed);
        assert!(options.task_deadline(&options.sweep_policy()) >= attempt);
    }

    #[test]
    fn task_deadline_grows_with_attempts_and_page_load_timeout() {
        let base = DetailOptions::default();
        let more_attempts = RetryPolicy::linear(10, base.retry.base_delay);
        assert!(base.task_deadline(&more_attempts) > base.task_deadline(&base.retry));

        let slow_pages = DetailOptions {
            page_load_timeout: base.page_load_timeout * 4,
            ..DetailOptions::default()
        };
        assert!(slow_pages.task_deadline(&base.retry) > base.task_deadline(&base.retry));

        let plain = DetailOptions {
            navigate: NavigateOptions::plain(Duration::from_secs(1)),
            ..DetailOptions::default()
        };
        assert_eq!(
            plain.attempt_timeout(),
            plain.page_load_timeout + Duration::from_secs(1) + plain.selector_timeout
        );
    }

    #[test]
    fn duplicate_urls_keep_first_title() {
        let deduped = dedup_by_url(vec![
            CandidateUrl::new("first", "https://example.com/a"),
            CandidateUrl::new("b", "https://example.com/b"),
            CandidateUrl::new("second", "https://example.com/a"),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
    }
}
