//! HTML extraction helpers on top of `scraper`
//!
//! Site parsers are written against these helpers so that a missing element
//! surfaces as a typed [`ExtractError`] instead of a panic.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::utils::normalize_whitespace;

/// Failure while turning a fetched page into structured data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    #[error("required element missing: {0}")]
    MissingElement(String),

    #[error("page does not look like a {0} page")]
    UnexpectedLayout(&'static str),
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Compile a CSS selector
pub fn selector(css: &str) -> ExtractResult<Selector> {
    Selector::parse(css).map_err(|_| ExtractError::InvalidSelector(css.to_string()))
}

/// Whitespace-normalized text of an element and all of its descendants
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Text of an element keeping one line per text block
///
/// Used for descriptions, where line structure carries meaning.
#[must_use]
pub fn multiline_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text that belongs directly to `element`, excluding its child elements
#[must_use]
pub fn own_text(element: ElementRef<'_>) -> String {
    let raw: String = element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
        .collect();
    normalize_whitespace(&raw)
}

/// Text of the first match under `scope`, if any
pub fn first_text(scope: ElementRef<'_>, css: &str) -> ExtractResult<Option<String>> {
    let sel = selector(css)?;
    Ok(scope.select(&sel).next().map(element_text))
}

/// Text of the first match under `scope`, failing when absent
pub fn required_text(scope: ElementRef<'_>, css: &str) -> ExtractResult<String> {
    first_text(scope, css)?.ok_or_else(|| ExtractError::MissingElement(css.to_string()))
}

/// Non-empty texts of every match under `scope`, in document order
pub fn all_texts(scope: ElementRef<'_>, css: &str) -> ExtractResult<Vec<String>> {
    let sel = selector(css)?;
    Ok(scope
        .select(&sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect())
}

/// First match in the whole document
pub fn select_first<'a>(document: &'a Html, css: &str) -> ExtractResult<Option<ElementRef<'a>>> {
    let sel = selector(css)?;
    Ok(document.select(&sel).next())
}

/// Whether the document contains at least one match
pub fn has_match(html: &str, css: &str) -> ExtractResult<bool> {
    let document = Html::parse_document(html);
    Ok(select_first(&document, css)?.is_some())
}

/// Closest ancestor of `element` that matches `css`
pub fn closest<'a>(element: ElementRef<'a>, css: &str) -> ExtractResult<Option<ElementRef<'a>>> {
    let sel = selector(css)?;
    Ok(element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| sel.matches(ancestor)))
}

/// Next sibling element, skipping text and comment nodes
#[must_use]
pub fn next_element_sibling(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

/// Next sibling element with the given tag name
#[must_use]
pub fn next_sibling_named<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

/// Every element under `scope` matching `css` whose text equals one of `labels`
pub fn find_labelled<'a>(
    scope: ElementRef<'a>,
    css: &str,
    labels: &[&str],
) -> ExtractResult<Vec<ElementRef<'a>>> {
    let sel = selector(css)?;
    Ok(scope
        .select(&sel)
        .filter(|el| labels.contains(&element_text(*el).as_str()))
        .collect())
}

/// First `tag` element that follows `marker` in document order within `scope`
#[must_use]
pub fn first_after<'a>(scope: ElementRef<'a>, marker: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    scope
        .descendants()
        .skip_while(|node| node.id() != marker.id())
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

/// Largest number appearing in any of the given texts
///
/// Pagination widgets render as "1 2 3 ... 42 Next"; the last page is the
/// biggest number present.
#[must_use]
pub fn max_number_in(texts: &[String]) -> Option<u32> {
    let re = Regex::new(r"\d+").ok()?;
    texts
        .iter()
        .flat_map(|t| re.find_iter(t).filter_map(|m| m.as_str().parse::<u32>().ok()))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"
        <div class="card">
            <div class="title">Skills:</div>
            <div class="values"><a>Rust</a><a> Tokio </a></div>
            <ul class="page"><li>1</li><li>2</li><li>...</li><li>17</li><li>Next</li></ul>
        </div>"#;

    #[test]
    fn labelled_block_and_sibling() {
        let doc = Html::parse_document(FRAGMENT);
        let card = select_first(&doc, "div.card").unwrap().unwrap();
        let labels = find_labelled(card, "div", &["Skills:"]).unwrap();
        assert_eq!(labels.len(), 1);
        let values = next_sibling_named(labels[0], "div").unwrap();
        assert_eq!(all_texts(values, "a").unwrap(), vec!["Rust", "Tokio"]);
    }

    #[test]
    fn pagination_number_is_the_maximum() {
        let doc = Html::parse_document(FRAGMENT);
        let page = select_first(&doc, "ul.page").unwrap().unwrap();
        assert_eq!(max_number_in(&[element_text(page)]), Some(17));
        assert_eq!(max_number_in(&["Next".to_string()]), None);
    }

    #[test]
    fn missing_element_is_an_error() {
        let doc = Html::parse_document(FRAGMENT);
        let card = select_first(&doc, "div.card").unwrap().unwrap();
        assert_eq!(
            required_text(card, "h1"),
            Err(ExtractError::MissingElement("h1".to_string()))
        );
    }
}
