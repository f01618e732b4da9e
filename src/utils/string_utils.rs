//! Text helpers shared by the site parsers and the notifier

use std::collections::HashSet;
use std::hash::Hash;

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// Never splits a multi-byte character, which matters for Vietnamese text
/// where most accented letters take two or three bytes.
///
/// # Examples
/// ```
/// # use jobhub_crawler::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Kỹ năng", 2), "Kỹ");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

/// Collapse runs of whitespace (including newlines and NBSP) into single spaces
/// and trim both ends.
#[must_use]
pub fn normalize_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove duplicates while keeping the first occurrence of each item in place.
#[must_use]
pub fn dedup_preserving_order<T>(items: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_mixed_whitespace() {
        assert_eq!(normalize_whitespace("  Ho Chi\n\t Minh\u{a0}City "), "Ho Chi Minh City");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let tags = vec!["Java", "Spring", "Java", "AWS", "Spring"];
        assert_eq!(dedup_preserving_order(tags), vec!["Java", "Spring", "AWS"]);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(safe_truncate_chars("Lĩnh vực", 4), "Lĩnh");
    }
}
