//! Page-range partitioning for the listing phase.

use std::ops::RangeInclusive;

/// Split pages `1..=total_pages` into at most `workers` contiguous chunks.
///
/// Chunks cover every page exactly once, never overlap and are never empty.
/// The first `total_pages % n` chunks take one extra page, where `n` is the
/// number of chunks (fewer than `workers` when there are fewer pages).
#[must_use]
pub fn chunk_pages(total_pages: u32, workers: usize) -> Vec<RangeInclusive<u32>> {
    if total_pages == 0 {
        return Vec::new();
    }

    let chunks = u32::try_from(workers.max(1))
        .unwrap_or(u32::MAX)
        .min(total_pages);
    let base = total_pages / chunks;
    let remainder = total_pages % chunks;

    let mut ranges = Vec::with_capacity(chunks as usize);
    let mut start = 1;
    for i in 0..chunks {
        let len = base + u32::from(i < remainder);
        let end = start + len - 1;
        ranges.push(start..=end);
        start = end + 1;
    }
    ranges
}
