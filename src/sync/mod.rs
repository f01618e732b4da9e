//! Push persisted batches into the job storage API
//!
//! Two strategies: replace the remote collection wholesale, or upload only
//! records whose URL the remote side does not have yet.

mod client;

pub use client::{ApiConfig, JobApiClient, RemoteJob, SyncError};

use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::page_extractor::schema::{CrawlBatch, JobRecord};
use crate::utils::{SYNC_BATCH_PAUSE, SYNC_BATCH_SIZE, SYNC_DELETE_CONCURRENCY, SYNC_UPLOAD_CONCURRENCY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Delete every remote job, then upload the batch
    FullReplace,
    /// Upload jobs whose URL is not stored remotely
    Incremental,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub deleted: usize,
    pub uploaded: usize,
    /// Jobs already present remotely
    pub skipped: usize,
    /// Failed deletes and uploads
    pub failed: usize,
}

/// Sync `batch` to the storage API.
///
/// Fails only when the remote listing cannot be read; individual delete and
/// upload failures are counted in the report.
pub async fn sync_batch(
    client: &JobApiClient,
    batch: &CrawlBatch,
    strategy: SyncStrategy,
) -> Result<SyncReport, SyncError> {
    let remote = client.list_jobs().await?;
    info!(remote = remote.len(), local = batch.jobs.len(), ?strategy, "Starting sync");

    let mut report = SyncReport::default();
    let to_upload: Vec<&JobRecord> = match strategy {
        SyncStrategy::FullReplace => {
            let (deleted, failed) = delete_all(client, &remote).await;
            report.deleted = deleted;
            report.failed += failed;
            batch.jobs.iter().collect()
        }
        SyncStrategy::Incremental => {
            let known: HashSet<&str> = remote.iter().filter_map(|r| r.url.as_deref()).collect();
            let (fresh, existing): (Vec<&JobRecord>, Vec<&JobRecord>) =
                batch.jobs.iter().partition(|job| !known.contains(job.url.as_str()));
            report.skipped = existing.len();
            fresh
        }
    };

    let (uploaded, failed) = upload(client, &to_upload).await;
    report.uploaded = uploaded;
    report.failed += failed;

    info!(
        deleted = report.deleted,
        uploaded = report.uploaded,
        skipped = report.skipped,
        failed = report.failed,
        "Sync finished"
    );
    Ok(report)
}

async fn delete_all(client: &JobApiClient, remote: &[RemoteJob]) -> (usize, usize) {
    let results: Vec<bool> = stream::iter(remote)
        .map(|job| async move {
            match client.delete_job(job.id).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Delete of job {} failed: {e}", job.id);
                    false
                }
            }
        })
        .buffer_unordered(SYNC_DELETE_CONCURRENCY)
        .collect()
        .await;

    let deleted = results.iter().filter(|ok| **ok).count();
    info!("Deleted {deleted}/{} remote jobs", remote.len());
    (deleted, results.len() - deleted)
}

async fn upload(client: &JobApiClient, jobs: &[&JobRecord]) -> (usize, usize) {
    let total = jobs.len();
    let mut uploaded = 0;
    let mut failed = 0;

    for (index, chunk) in jobs.chunks(SYNC_BATCH_SIZE).enumerate() {
        let results: Vec<bool> = stream::iter(chunk)
            .map(|job| async move {
                match client.create_job(job).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Upload of {} failed: {e}", job.url);
                        false
                    }
                }
            })
            .buffer_unordered(SYNC_UPLOAD_CONCURRENCY)
            .collect()
            .await;

        let ok = results.iter().filter(|ok| **ok).count();
        uploaded += ok;
        failed += results.len() - ok;

        let done = (index * SYNC_BATCH_SIZE + chunk.len()).min(total);
        info!("Uploaded {uploaded}/{done} of {total}");
        if done < total {
            tokio::time::sleep(SYNC_BATCH_PAUSE).await;
        }
    }
    (uploaded, failed)
}
