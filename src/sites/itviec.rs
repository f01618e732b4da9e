//! ITviec: paginated listing behind a Cloudflare challenge; details rendered
//! server-side but only reachable through the browser.

use scraper::Html;

use super::{FetchStrategy, SiteProfile};
use crate::page_extractor::extractors::{
    ExtractError, ExtractResult, all_texts, closest, element_text, find_labelled, first_text,
    max_number_in, multiline_text, next_element_sibling, next_sibling_named, required_text,
    select_first, selector,
};
use crate::page_extractor::schema::{CandidateUrl, JobRecord};
use crate::utils::{dedup_preserving_order, resolve_href};

pub const BASE_URL: &str = "https://itviec.com/it-jobs";

const SKILL_HEADINGS: &[&str] = &["Skills:", "Job Domain:", "Kỹ năng:", "Lĩnh vực:"];
const EXPERTISE_HEADINGS: &[&str] = &["Job Expertise:", "Chuyên môn:"];

#[must_use]
pub fn profile() -> SiteProfile {
    SiteProfile {
        name: "itviec",
        base_url: BASE_URL,
        listing_selector: "div.job-card",
        detail_selector: "div.job-header-info h1",
        challenge_bypass: true,
        infinite_scroll: false,
        fetch_strategy: FetchStrategy::Browser,
        page_url,
        parse_total_pages,
        parse_listing,
        parse_detail,
    }
}

fn page_url(page: u32) -> String {
    format!("{BASE_URL}?page={page}")
}

/// Last page number from the pagination bar, `None` when there is no bar
pub fn parse_total_pages(html: &str) -> Option<u32> {
    let document = Html::parse_document(html);
    let sel = selector("div.page, nav.pagination, ul.pagination, div.pagination").ok()?;
    let texts: Vec<String> = document.select(&sel).map(element_text).collect();
    max_number_in(&texts).filter(|&n| n > 0)
}

pub fn parse_listing(html: &str) -> ExtractResult<Vec<CandidateUrl>> {
    let document = Html::parse_document(html);
    let cards = selector("div.job-card")?;
    let title = selector("h3[data-url]")?;

    let candidates = document
        .select(&cards)
        .filter_map(|card| card.select(&title).next())
        .filter_map(|h3| {
            let url = resolve_href(BASE_URL, h3.value().attr("data-url")?)?;
            Some(CandidateUrl::new(element_text(h3), url))
        })
        .collect();
    Ok(candidates)
}

pub fn parse_detail(html: &str, candidate: &CandidateUrl) -> ExtractResult<JobRecord> {
    let document = Html::parse_document(html);
    let header = select_first(&document, "div.job-header-info")?
        .ok_or(ExtractError::UnexpectedLayout("ITviec job"))?;

    let mut job = JobRecord::new(required_text(header, "h1")?, &candidate.url, BASE_URL);
    job.company = first_text(header, "div.employer-name")?.unwrap_or_default();
    job.salary = first_text(header, "a")?.unwrap_or_default();

    // The block after the header holds location, posting age and the overview
    let overview = closest(header, "div.job-show-header")?.and_then(next_element_sibling);
    if let Some(overview) = overview {
        let mut spans = all_texts(overview, "span")?;
        if let Some(posted_at) = spans.pop() {
            job.posted_at = posted_at;
        }
        job.location = spans;

        for label in find_labelled(overview, "div", SKILL_HEADINGS)? {
            if let Some(values) = next_sibling_named(label, "div") {
                let links = all_texts(values, "a")?;
                if links.is_empty() {
                    job.tags.extend(all_texts(values, "div")?);
                } else {
                    job.tags.extend(links);
                }
            }
        }
        for label in find_labelled(overview, "div", EXPERTISE_HEADINGS)? {
            if let Some(values) = next_sibling_named(label, "div") {
                job.experience.extend(all_texts(values, "a")?);
            }
        }
        job.tags = dedup_preserving_order(job.tags);
    }

    job.description = select_first(&document, "section.job-content")?
        .map(multiline_text)
        .unwrap_or_default();

    Ok(job.normalized())
}
