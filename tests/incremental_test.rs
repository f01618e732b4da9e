//! Diff and merge behaviour of the incremental engine

use chrono::{TimeZone, Utc};
use jobhub_crawler::{CandidateUrl, CrawlBatch, JobRecord, diff, load_previous_urls, merge, save_batch};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::TempDir;

mod common;

const SOURCES: &[&str] = &["https://itviec.com/it-jobs", "https://topdev.vn/viec-lam-it"];

fn url(n: u8) -> String {
    format!("https://jobs.test/{n}")
}

fn batch_of(ids: &[(u8, &str)], secs: i64, execution_time: f64) -> CrawlBatch {
    let jobs = ids
        .iter()
        .enumerate()
        .map(|(i, (id, title))| common::job(&url(*id), title, SOURCES[i % SOURCES.len()]))
        .collect();
    CrawlBatch::from_jobs(jobs, Utc.timestamp_opt(secs, 0).unwrap(), execution_time)
}

proptest! {
    #[test]
    fn diff_returns_exactly_the_unseen_urls(
        previous in proptest::collection::hash_set(0u8..40, 0..30),
        listed in proptest::collection::vec(0u8..40, 0..60),
    ) {
        let previous: HashSet<String> = previous.into_iter().map(url).collect();
        let candidates: Vec<CandidateUrl> =
            listed.iter().map(|n| CandidateUrl::new(format!("job {n}"), url(*n))).collect();

        let fresh = diff(&previous, &candidates);

        let fresh_urls: Vec<&str> = fresh.iter().map(|c| c.url.as_str()).collect();
        let unique: HashSet<&str> = fresh_urls.iter().copied().collect();
        prop_assert_eq!(unique.len(), fresh_urls.len());
        prop_assert!(fresh.iter().all(|c| !previous.contains(&c.url)));

        let expected: HashSet<&str> = candidates
            .iter()
            .map(|c| c.url.as_str())
            .filter(|u| !previous.contains(*u))
            .collect();
        prop_assert_eq!(unique, expected);
    }

    #[test]
    fn diff_is_idempotent(
        previous in proptest::collection::hash_set(0u8..20, 0..10),
        listed in proptest::collection::vec(0u8..20, 0..30),
    ) {
        let previous: HashSet<String> = previous.into_iter().map(url).collect();
        let candidates: Vec<CandidateUrl> =
            listed.iter().map(|n| CandidateUrl::new("", url(*n))).collect();

        let once = diff(&previous, &candidates);
        prop_assert_eq!(diff(&previous, &once), once.clone());

        // Everything just diffed is known next time
        let mut known = previous.clone();
        known.extend(once.iter().map(|c| c.url.clone()));
        prop_assert!(diff(&known, &candidates).is_empty());
    }

    #[test]
    fn merge_keeps_one_record_per_url_with_consistent_metadata(
        older in proptest::collection::vec(0u8..30, 0..25),
        newer in proptest::collection::vec(0u8..30, 0..25),
    ) {
        let older_ids: Vec<(u8, &str)> = older.iter().map(|n| (*n, "old")).collect();
        let newer_ids: Vec<(u8, &str)> = newer.iter().map(|n| (*n, "new")).collect();
        let merged = merge(batch_of(&older_ids, 100, 1.0), batch_of(&newer_ids, 200, 2.0));

        let urls: Vec<&str> = merged.jobs.iter().map(|j| j.url.as_str()).collect();
        let unique: HashSet<&str> = urls.iter().copied().collect();
        prop_assert_eq!(unique.len(), urls.len());

        let expected: HashSet<String> = older.iter().chain(&newer).map(|n| url(*n)).collect();
        prop_assert_eq!(unique.len(), expected.len());

        let newer_urls: HashSet<String> = newer.iter().map(|n| url(*n)).collect();
        for job in &merged.jobs {
            let want = if newer_urls.contains(&job.url) { "new" } else { "old" };
            prop_assert_eq!(job.title.as_str(), want);
        }

        prop_assert!(merged.is_consistent());
        prop_assert_eq!(merged.metadata.created_at.timestamp(), 200);
        prop_assert!((merged.metadata.execution_time - 3.0).abs() < f64::EPSILON);
    }
}

#[test]
fn merge_keeps_older_order_and_appends_new_urls() {
    let older = batch_of(&[(1, "a"), (2, "b"), (3, "c")], 300, 4.0);
    let newer = batch_of(&[(4, "d"), (2, "b2")], 100, 1.0);

    let merged = merge(older, newer);

    let titles: Vec<&str> = merged.jobs.iter().map(|j| j.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b2", "c", "d"]);
    // The later timestamp wins even when it belongs to the older batch
    assert_eq!(merged.metadata.created_at.timestamp(), 300);
    assert_eq!(merged.metadata.total_jobs, 4);
}

#[test]
fn merging_into_an_empty_batch_yields_the_new_batch() {
    let empty = CrawlBatch::from_jobs(Vec::new(), Utc.timestamp_opt(0, 0).unwrap(), 0.0);
    let newer = batch_of(&[(1, "a"), (2, "b")], 50, 2.5);

    let merged = merge(empty, newer.clone());

    assert_eq!(merged.jobs, newer.jobs);
    assert_eq!(merged.metadata.sources, newer.metadata.sources);
}

#[tokio::test]
async fn first_run_treats_every_candidate_as_new() {
    let dir = TempDir::new().unwrap();
    let previous = load_previous_urls(&dir.path().join("missing")).await;
    assert!(previous.is_empty());

    let candidates = vec![
        CandidateUrl::new("a", url(1)),
        CandidateUrl::new("b", url(2)),
        CandidateUrl::new("a again", url(1)),
    ];
    let fresh = diff(&previous, &candidates);
    assert_eq!(fresh.len(), 2);
    assert_eq!(fresh[0].title, "a");
}

#[tokio::test]
async fn previous_urls_come_from_the_newest_batch() {
    let dir = TempDir::new().unwrap();
    let batch = CrawlBatch::from_jobs(
        vec![
            JobRecord::new("a", url(1), SOURCES[0]),
            JobRecord::new("b", url(2), SOURCES[1]),
        ],
        Utc::now(),
        1.0,
    );
    save_batch(&batch, dir.path()).await.unwrap();

    let previous = load_previous_urls(dir.path()).await;
    assert_eq!(previous, HashSet::from([url(1), url(2)]));

    let fresh = diff(&previous, &[CandidateUrl::new("a", url(1)), CandidateUrl::new("c", url(3))]);
    assert_eq!(fresh, vec![CandidateUrl::new("c", url(3))]);
}

#[tokio::test]
async fn unreadable_previous_batch_counts_as_no_history() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("jobs_20240101_000000.json"), "{ not json").unwrap();

    assert!(load_previous_urls(dir.path()).await.is_empty());
}
