//! Test utilities for the jobhub_crawler test suite
//!
//! `MockWeb` is a scripted set of pages keyed by URL. `MockFactory` hands out
//! `MockSession`s that browse it, so the pool and both crawl phases can be
//! driven without a browser.

#![allow(dead_code)]

use parking_lot::Mutex;
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use jobhub_crawler::page_extractor::extractors::{
    ExtractResult, all_texts, has_match, max_number_in, required_text, select_first, selector,
};
use jobhub_crawler::sites::{FetchStrategy, SiteProfile};
use jobhub_crawler::{BrowserSession, CandidateUrl, JobRecord, SessionError, SessionFactory};

pub const CHALLENGE_HTML: &str = "<html><head><title>Just a moment...</title></head></html>";

/// Number of failures meaning "fail forever"
pub const ALWAYS: u32 = u32::MAX;

#[derive(Default)]
pub struct MockWeb {
    pages: Mutex<HashMap<String, String>>,
    /// Remaining failing loads per URL
    failures: Mutex<HashMap<String, u32>>,
    /// Remaining crashing loads per URL
    crashes: Mutex<HashMap<String, u32>>,
    /// Remaining content reads per URL that show the challenge page
    challenges: Mutex<HashMap<String, u32>>,
    visits: Mutex<HashMap<String, u32>>,
}

impl MockWeb {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn page(&self, url: impl Into<String>, html: impl Into<String>) -> &Self {
        self.pages.lock().insert(url.into(), html.into());
        self
    }

    pub fn fail(&self, url: impl Into<String>, times: u32) -> &Self {
        self.failures.lock().insert(url.into(), times);
        self
    }

    pub fn crash(&self, url: impl Into<String>, times: u32) -> &Self {
        self.crashes.lock().insert(url.into(), times);
        self
    }

    pub fn challenge(&self, url: impl Into<String>, reads: u32) -> &Self {
        self.challenges.lock().insert(url.into(), reads);
        self
    }

    /// Loads of `url` so far, failed ones included
    pub fn visits(&self, url: &str) -> u32 {
        self.visits.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_visits(&self) -> u32 {
        self.visits.lock().values().sum()
    }

    fn take(counter: &Mutex<HashMap<String, u32>>, url: &str) -> bool {
        let mut map = counter.lock();
        match map.get_mut(url) {
            Some(0) | None => false,
            Some(n) => {
                if *n != ALWAYS {
                    *n -= 1;
                }
                true
            }
        }
    }

    fn load(&self, url: &str) -> Result<(), SessionError> {
        *self.visits.lock().entry(url.to_string()).or_insert(0) += 1;
        if Self::take(&self.crashes, url) {
            return Err(SessionError::Crashed(format!("target closed while loading {url}")));
        }
        if Self::take(&self.failures, url) || !self.pages.lock().contains_key(url) {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".to_string(),
            });
        }
        Ok(())
    }

    fn read(&self, url: &str) -> String {
        if Self::take(&self.challenges, url) {
            return CHALLENGE_HTML.to_string();
        }
        self.pages.lock().get(url).cloned().unwrap_or_default()
    }
}

pub struct MockSession {
    id: u64,
    web: Arc<MockWeb>,
    current: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl MockSession {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn current_html(&self) -> String {
        let url = self.current.lock().clone();
        url.map(|u| self.web.read(&u)).unwrap_or_default()
    }
}

impl BrowserSession for MockSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let result = self.web.load(url);
        if let Err(SessionError::Crashed(_)) = &result {
            self.closed.store(true, Ordering::Release);
        }
        *self.current.lock() = result.is_ok().then(|| url.to_string());
        result
    }

    async fn content(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        Ok(self.current_html())
    }

    async fn wait_for_selector(&self, css: &str, timeout: Duration) -> Result<(), SessionError> {
        self.ensure_open()?;
        let html = self.current_html();
        match has_match(&html, css) {
            Ok(true) => Ok(()),
            Ok(false) => {
                tokio::time::sleep(timeout).await;
                Err(SessionError::ElementMissing(css.to_string()))
            }
            Err(e) => Err(SessionError::Script(e.to_string())),
        }
    }

    async fn scroll_to_bottom(&self, _delay: Duration, _max_rounds: u32) -> Result<u32, SessionError> {
        self.ensure_open()?;
        Ok(1)
    }

    async fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Clone)]
pub struct MockFactory {
    pub web: Arc<MockWeb>,
    next_id: Arc<AtomicU64>,
    created: Arc<AtomicUsize>,
    /// Creations left before `create` starts failing; `None` never fails
    launch_budget: Option<Arc<AtomicUsize>>,
}

impl MockFactory {
    pub fn new(web: Arc<MockWeb>) -> Self {
        Self {
            web,
            next_id: Arc::new(AtomicU64::new(1)),
            created: Arc::new(AtomicUsize::new(0)),
            launch_budget: None,
        }
    }

    /// A factory whose every launch fails
    pub fn broken(web: Arc<MockWeb>) -> Self {
        Self {
            launch_budget: Some(Arc::new(AtomicUsize::new(0))),
            ..Self::new(web)
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl SessionFactory for MockFactory {
    type Session = MockSession;

    async fn create(&self) -> Result<MockSession, SessionError> {
        if let Some(budget) = &self.launch_budget
            && budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        {
            return Err(SessionError::Launch("chrome exited with status 1".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            web: Arc::clone(&self.web),
            current: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }
}

// =============================================================================
// A small job board used by the orchestrator tests
// =============================================================================

pub const BOARD_BASE: &str = "https://board.test/jobs";

pub fn board_page_url(page: u32) -> String {
    format!("{BOARD_BASE}?page={page}")
}

pub fn board_job_url(id: u32) -> String {
    format!("https://board.test/job/{id}")
}

fn board_total_pages(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let texts = all_texts(document.root_element(), "ul.pagination li").ok()?;
    max_number_in(&texts)
}

fn board_listing(html: &str) -> ExtractResult<Vec<CandidateUrl>> {
    let document = Html::parse_document(html);
    let links = selector("div.job a")?;
    Ok(document
        .select(&links)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(CandidateUrl::new(a.text().collect::<String>(), href))
        })
        .collect())
}

fn board_detail(html: &str, candidate: &CandidateUrl) -> ExtractResult<JobRecord> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut job = JobRecord::new(required_text(root, "h1.title")?, &candidate.url, BOARD_BASE);
    if let Some(company) = select_first(&document, "span.company")? {
        job.company = company.text().collect();
    }
    job.tags = all_texts(root, "ul.tags li")?;
    Ok(job.normalized())
}

pub fn board_profile() -> SiteProfile {
    SiteProfile {
        name: "board",
        base_url: BOARD_BASE,
        listing_selector: "div.job",
        detail_selector: "h1.title",
        challenge_bypass: false,
        infinite_scroll: false,
        fetch_strategy: FetchStrategy::Browser,
        page_url: board_page_url,
        parse_total_pages: board_total_pages,
        parse_listing: board_listing,
        parse_detail: board_detail,
    }
}

/// Listing page linking `jobs`, with a pagination bar up to `total_pages`
pub fn board_listing_html(jobs: &[u32], total_pages: u32) -> String {
    let cards: String = jobs
        .iter()
        .map(|id| format!(r#"<div class="job"><a href="{}">Job {id}</a></div>"#, board_job_url(*id)))
        .collect();
    format!(
        r#"<html><body>{cards}<ul class="pagination"><li>1</li><li>{total_pages}</li></ul></body></html>"#
    )
}

pub fn board_detail_html(id: u32, company: &str, tags: &[&str]) -> String {
    let tags: String = tags.iter().map(|t| format!("<li>{t}</li>")).collect();
    format!(
        r#"<html><body><h1 class="title">Job {id}</h1><span class="company">{company}</span><ul class="tags">{tags}</ul></body></html>"#
    )
}

/// Register a board with `pages` listing pages of `per_page` jobs each and
/// a detail page per job. Returns every job id in listing order.
pub fn seed_board(web: &MockWeb, pages: u32, per_page: u32) -> Vec<u32> {
    let mut all = Vec::new();
    for page in 1..=pages {
        let ids: Vec<u32> = ((page - 1) * per_page + 1..=page * per_page).collect();
        web.page(board_page_url(page), board_listing_html(&ids, pages));
        if page == 1 {
            web.page(BOARD_BASE, board_listing_html(&ids, pages));
        }
        for id in &ids {
            web.page(board_job_url(*id), board_detail_html(*id, "Acme", &["Rust"]));
        }
        all.extend(ids);
    }
    all
}

pub fn job(url: &str, title: &str, source: &str) -> JobRecord {
    JobRecord::new(title, url, source)
}
