//! Per-site capability records
//!
//! A crawler is the generic orchestration in `crawl_engine` driven by one of
//! these records. Adding a job board means writing its parsers and a
//! [`SiteProfile`], nothing else.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::page_extractor::extractors::ExtractResult;
use crate::page_extractor::schema::{CandidateUrl, JobRecord};

pub mod itviec;
pub mod topdev;

/// How detail pages are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Always through a pooled browser session
    Browser,
    /// Plain HTTP first, browser session when the response is unusable
    HttpFirst,
}

/// Everything the orchestrators need to know about one job board
#[derive(Clone, Copy)]
pub struct SiteProfile {
    pub name: &'static str,
    /// Entry page; also the `source` of every record from this site
    pub base_url: &'static str,
    /// Present once a listing page has rendered its job cards
    pub listing_selector: &'static str,
    /// Present once a detail page has rendered; also validates HTTP responses
    pub detail_selector: &'static str,
    pub challenge_bypass: bool,
    /// Listing is one page that loads more cards on scroll
    pub infinite_scroll: bool,
    pub fetch_strategy: FetchStrategy,
    pub page_url: fn(u32) -> String,
    pub parse_total_pages: fn(&str) -> Option<u32>,
    pub parse_listing: fn(&str) -> ExtractResult<Vec<CandidateUrl>>,
    pub parse_detail: fn(&str, &CandidateUrl) -> ExtractResult<JobRecord>,
}

impl fmt::Debug for SiteProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteProfile")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("challenge_bypass", &self.challenge_bypass)
            .field("infinite_scroll", &self.infinite_scroll)
            .field("fetch_strategy", &self.fetch_strategy)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SiteProfile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.base_url == other.base_url
    }
}

/// Every built-in site
#[must_use]
pub fn all() -> Vec<SiteProfile> {
    vec![itviec::profile(), topdev::profile()]
}

/// Look a site up by name, case-insensitively
#[must_use]
pub fn by_name(name: &str) -> Option<SiteProfile> {
    all()
        .into_iter()
        .find(|site| site.name.eq_ignore_ascii_case(name.trim()))
}
