//! URL helpers used by the site parsers.

use url::Url;

/// Check if a URL is an absolute http(s) URL
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Resolve `href` against `base`, returning `None` for unusable links.
///
/// Fragments are stripped so the same posting linked with different anchors
/// maps to a single identity.
#[must_use]
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let base = Url::parse(base).ok()?;
    let mut joined = base.join(href).ok()?;
    joined.set_fragment(None);
    let joined = joined.to_string();
    is_valid_url(&joined).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_links() {
        assert_eq!(
            resolve_href("https://itviec.com/it-jobs", "/it-jobs/rust-dev-1234#apply").as_deref(),
            Some("https://itviec.com/it-jobs/rust-dev-1234")
        );
    }

    #[test]
    fn rejects_non_http_links() {
        assert_eq!(resolve_href("https://topdev.vn/", "javascript:void(0)"), None);
        assert_eq!(resolve_href("https://topdev.vn/", "#top"), None);
        assert!(!is_valid_url("mailto:hr@example.com"));
    }
}
