use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tokio::time::timeout;

use crate::page_extractor::schema::CrawlBatch;

/// Timeout for blocking JSON serialization and file writes
const BLOCKING_SERIALIZATION_TIMEOUT: Duration = Duration::from_secs(10);

/// File name prefix of every persisted batch
pub const BATCH_FILE_PREFIX: &str = "jobs_";

/// `jobs_<YYYYMMDD_HHMMSS>.json`
#[must_use]
pub fn batch_file_name(at: DateTime<Utc>) -> String {
    format!("{BATCH_FILE_PREFIX}{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Save a batch as pretty UTF-8 JSON into `output_dir` and return its path.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// reader never observes a half-written batch.
pub async fn save_batch(batch: &CrawlBatch, output_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let path = output_dir.join(batch_file_name(batch.metadata.created_at));
    let total = batch.jobs.len();
    let batch = batch.clone();
    let parent = output_dir.to_path_buf();
    let target = path.clone();

    // Serialization and the write stay off the async workers
    let blocking_task = tokio::task::spawn_blocking(move || -> Result<()> {
        let json = serde_json::to_string_pretty(&batch)?;
        let mut temp_file = NamedTempFile::new_in(&parent)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(&target)?;
        Ok(())
    });

    match timeout(BLOCKING_SERIALIZATION_TIMEOUT, blocking_task).await {
        Ok(Ok(result)) => result.with_context(|| format!("writing {}", path.display()))?,
        Ok(Err(e)) => return Err(anyhow::anyhow!("Batch write task panicked: {}", e)),
        Err(_) => {
            log::warn!(
                "Batch write timeout (timeout: {:?})",
                BLOCKING_SERIALIZATION_TIMEOUT
            );
            return Err(anyhow::anyhow!(
                "Batch write timed out after {:?}",
                BLOCKING_SERIALIZATION_TIMEOUT
            ));
        }
    }

    log::info!("Saved {total} jobs to {}", path.display());
    Ok(path)
}

/// Newest `*.json` file in `dir` by modification time
///
/// A missing or unreadable directory has no newest file.
pub async fn latest_batch_file(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        // Ties broken by name so same-second batches resolve to the later stamp
        let newer = match &newest {
            None => true,
            Some((time, best)) => modified > *time || (modified == *time && path > *best),
        };
        if newer {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path)
}

/// Read and parse one persisted batch
pub async fn load_batch(path: &Path) -> Result<CrawlBatch> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let batch = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(batch)
}

/// The newest batch in `dir`, `None` when there is none
pub async fn load_latest_batch(dir: &Path) -> Result<Option<CrawlBatch>> {
    match latest_batch_file(dir).await {
        Some(path) => Ok(Some(load_batch(&path).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_uses_compact_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(batch_file_name(at), "jobs_20250309_070501.json");
    }

    #[tokio::test]
    async fn missing_directory_has_no_latest_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_batch_file(&dir.path().join("absent")).await.is_none());
        assert!(load_latest_batch(dir.path()).await.unwrap().is_none());
    }
}
