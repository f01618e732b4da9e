//! Incremental crawling against the previously persisted batch.
//!
//! URL is the only identity: a candidate is new when its URL is absent from
//! the last batch, and merging keeps one record per URL.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::content_saver::{latest_batch_file, load_batch};
use crate::page_extractor::schema::{CandidateUrl, CrawlBatch, JobRecord};

/// URLs of the newest batch in `output_dir`.
///
/// No directory or no batch yields an empty set; so does an unreadable
/// batch, after logging it.
pub async fn load_previous_urls(output_dir: &Path) -> HashSet<String> {
    let Some(path) = latest_batch_file(output_dir).await else {
        debug!(dir = %output_dir.display(), "No previous batch");
        return HashSet::new();
    };

    match load_batch(&path).await {
        Ok(batch) => {
            debug!(file = %path.display(), jobs = batch.jobs.len(), "Loaded previous batch");
            batch.urls()
        }
        Err(e) => {
            warn!(file = %path.display(), "Ignoring unreadable previous batch: {e:#}");
            HashSet::new()
        }
    }
}

/// Candidates whose URL is not in `previous`, first occurrence wins, order kept
#[must_use]
pub fn diff(previous: &HashSet<String>, candidates: &[CandidateUrl]) -> Vec<CandidateUrl> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|c| !previous.contains(&c.url) && seen.insert(c.url.clone()))
        .cloned()
        .collect()
}

/// Union of two batches keyed by URL, `newer` winning on conflicts.
///
/// Records keep `older`'s order, with replacements in place, followed by
/// URLs only `newer` has. Metadata is recomputed: the later timestamp and
/// the summed execution time.
#[must_use]
pub fn merge(older: CrawlBatch, newer: CrawlBatch) -> CrawlBatch {
    let created_at = older.metadata.created_at.max(newer.metadata.created_at);
    let execution_time = older.metadata.execution_time + newer.metadata.execution_time;

    let mut position: HashMap<String, usize> = HashMap::new();
    let mut jobs: Vec<JobRecord> = Vec::with_capacity(older.jobs.len() + newer.jobs.len());
    for job in older.jobs.into_iter().chain(newer.jobs) {
        match position.get(&job.url) {
            Some(&i) => jobs[i] = job,
            None => {
                position.insert(job.url.clone(), jobs.len());
                jobs.push(job);
            }
        }
    }

    CrawlBatch::from_jobs(jobs, created_at, execution_time)
}
