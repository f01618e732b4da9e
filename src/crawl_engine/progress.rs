//! Lock-free crawl counters
//!
//! Shared by every worker of a crawler; read once at the end for the run
//! summary and the status notification.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CrawlCounters {
    pages_crawled: AtomicUsize,
    pages_failed: AtomicUsize,
    candidates_found: AtomicUsize,
    records_parsed: AtomicUsize,
    errors: AtomicUsize,
    dropped: AtomicUsize,
}

/// Point-in-time copy of [`CrawlCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub candidates_found: usize,
    pub records_parsed: usize,
    pub errors: usize,
    pub dropped: usize,
}

impl CrawlCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_crawled(&self, candidates: usize) {
        self.pages_crawled.fetch_add(1, Ordering::Relaxed);
        self.candidates_found.fetch_add(candidates, Ordering::Relaxed);
    }

    pub fn page_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parsed(&self) {
        self.records_parsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self, count: usize) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            pages_crawled: self.pages_crawled.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            candidates_found: self.candidates_found.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
