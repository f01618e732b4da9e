//! TopDev: a single infinite-scroll listing; detail pages are server-rendered
//! and usually fetchable over plain HTTP.

use scraper::{ElementRef, Html};

use super::{FetchStrategy, SiteProfile};
use crate::page_extractor::extractors::{
    ExtractError, ExtractResult, all_texts, element_text, first_after, first_text, own_text,
    required_text, select_first, selector,
};
use crate::page_extractor::schema::{CandidateUrl, JobRecord};
use crate::utils::resolve_href;

pub const BASE_URL: &str = "https://topdev.vn/viec-lam-it";

const LISTING_PATH: &str = "/viec-lam/";
const DETAIL_PATH: &str = "/detail-jobs/";

#[must_use]
pub fn profile() -> SiteProfile {
    SiteProfile {
        name: "topdev",
        base_url: BASE_URL,
        listing_selector: r"section ul li.mb-4",
        detail_selector: "section#detailJobHeader h1",
        challenge_bypass: false,
        infinite_scroll: true,
        fetch_strategy: FetchStrategy::HttpFirst,
        page_url,
        parse_total_pages,
        parse_listing,
        parse_detail,
    }
}

fn page_url(_page: u32) -> String {
    BASE_URL.to_string()
}

/// The listing is a single scrolling page
fn parse_total_pages(_html: &str) -> Option<u32> {
    Some(1)
}

/// Listing links point at `/viec-lam/...`, which redirects through a
/// client-side router; `/detail-jobs/...` serves the full page.
fn detail_url(href: &str) -> Option<String> {
    let url = resolve_href(BASE_URL, href)?;
    Some(url.replacen(LISTING_PATH, DETAIL_PATH, 1))
}

pub fn parse_listing(html: &str) -> ExtractResult<Vec<CandidateUrl>> {
    let document = Html::parse_document(html);
    let items = selector(r"section ul li.mb-4.last\:mb-0")?;
    let title = selector("h3.line-clamp-1 a")?;

    let candidates = document
        .select(&items)
        .filter_map(|item| item.select(&title).next())
        .filter_map(|link| {
            let url = detail_url(link.value().attr("href")?)?;
            Some(CandidateUrl::new(element_text(link), url))
        })
        .collect();
    Ok(candidates)
}

/// First element under `scope` whose own text contains `needle`
fn own_text_containing<'a>(scope: ElementRef<'a>, needle: &str) -> Option<ElementRef<'a>> {
    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| own_text(*el).contains(needle))
}

/// First `tag` element under `scope` whose text is exactly `label`
fn labelled<'a>(scope: ElementRef<'a>, tag: &str, label: &str) -> ExtractResult<Option<ElementRef<'a>>> {
    let sel = selector(tag)?;
    Ok(scope.select(&sel).find(|el| element_text(*el) == label))
}

pub fn parse_detail(html: &str, candidate: &CandidateUrl) -> ExtractResult<JobRecord> {
    let document = Html::parse_document(html);
    let card = select_first(&document, r#"section#detailJobPage div[id^="card-job-"]"#)?
        .ok_or(ExtractError::UnexpectedLayout("TopDev job"))?;
    let header_sel = selector("section#detailJobHeader")?;
    let header = card
        .select(&header_sel)
        .next()
        .ok_or_else(|| ExtractError::MissingElement("section#detailJobHeader".into()))?;

    let mut job = JobRecord::new(required_text(header, "h1")?, &candidate.url, BASE_URL);
    job.company = first_text(header, "p")?.unwrap_or_default();
    job.location = first_text(header, r#"div[data-testid="flowbite-tooltip"]"#)?
        .into_iter()
        .collect();

    let middle = header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "section");
    if let Some(middle) = middle {
        if let Some(posted) = own_text_containing(middle, "Posted") {
            job.posted_at = element_text(posted);
        }
        if let Some(button) = labelled(middle, "button", "Sign In to view salary")? {
            job.salary = element_text(button);
        }
        if let Some(heading) = labelled(middle, "h3", "Year of experience")?
            && let Some(link) = first_after(card, heading, "a")
        {
            job.experience = vec![element_text(link)];
        }
        if let Some(heading) = labelled(middle, "h3", "Job Level")?
            && let Some(link) = first_after(card, heading, "a")
        {
            job.level = element_text(link);
        }
        job.tags = all_texts(middle, r"a span.text-xs, a span.md\:text-sm")?;
    }

    let description = selector("section#cardContentDetailJob div#JobDescription")?;
    job.description = card
        .select(&description)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();

    Ok(job.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_links_are_rewritten_to_detail_pages() {
        let html = r#"
            <section><ul>
              <li class="mb-4 last:mb-0"><h3 class="line-clamp-1"><a href="/viec-lam/rust-backend-2001">Rust Backend</a></h3></li>
              <li class="mb-4 last:mb-0"><h3 class="line-clamp-1"><a href="https://topdev.vn/viec-lam/data-engineer-2002">Data Engineer</a></h3></li>
              <li class="mb-4 last:mb-0"><h3 class="line-clamp-1">Ad slot</h3></li>
            </ul></section>"#;

        let candidates = parse_listing(html).unwrap();
        assert_eq!(
            candidates,
            vec![
                CandidateUrl::new("Rust Backend", "https://topdev.vn/detail-jobs/rust-backend-2001"),
                CandidateUrl::new("Data Engineer", "https://topdev.vn/detail-jobs/data-engineer-2002"),
            ]
        );
        assert_eq!((profile().page_url)(7), BASE_URL);
        assert_eq!((profile().parse_total_pages)(html), Some(1));
    }

    #[test]
    fn detail_page_fields() {
        let html = r#"
            <section id="detailJobPage"><div id="card-job-2001">
              <section id="detailJobHeader">
                <h1>Rust Backend Developer</h1>
                <p>VNG Corporation</p>
                <div data-testid="flowbite-tooltip">Ho Chi Minh</div>
              </section>
              <section>
                <div><span>Posted 3 days ago</span></div>
                <button>Sign In to view salary</button>
                <div><h3>Year of experience</h3><div><a>3 - 5 years</a></div></div>
                <div><h3>Job Level</h3><div><a>Senior</a></div></div>
                <a><span class="text-xs">Rust</span></a>
                <a><span class="md:text-sm">PostgreSQL</span></a>
              </section>
              <section id="cardContentDetailJob"><div id="JobDescription"> Own the ingestion pipeline. </div></section>
            </div></section>"#;
        let candidate = CandidateUrl::new("Rust Backend", "https://topdev.vn/detail-jobs/rust-backend-2001");

        let job = parse_detail(html, &candidate).unwrap();
        assert_eq!(job.title, "Rust Backend Developer");
        assert_eq!(job.company, "VNG Corporation");
        assert_eq!(job.location, vec!["Ho Chi Minh"]);
        assert_eq!(job.posted_at, "Posted 3 days ago");
        assert_eq!(job.salary, "Sign In to view salary");
        assert_eq!(job.experience, vec!["3 - 5 years"]);
        assert_eq!(job.level, "Senior");
        assert_eq!(job.tags, vec!["Rust", "PostgreSQL"]);
        assert_eq!(job.description, "Own the ingestion pipeline.");
        assert_eq!(job.source, BASE_URL);
    }

    #[test]
    fn router_shell_is_unexpected_layout() {
        let candidate = CandidateUrl::new("x", "https://topdev.vn/detail-jobs/x");
        assert_eq!(
            parse_detail("<div id='__next'></div>", &candidate),
            Err(ExtractError::UnexpectedLayout("TopDev job"))
        );
    }
}
