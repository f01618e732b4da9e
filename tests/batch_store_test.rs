//! Batch persistence in the output directory

use chrono::{TimeZone, Utc};
use jobhub_crawler::content_saver::{batch_file_name, latest_batch_file, load_batch};
use jobhub_crawler::{CrawlBatch, JobRecord, load_latest_batch, save_batch};
use tempfile::TempDir;

fn sample_batch() -> CrawlBatch {
    let mut job = JobRecord::new(
        "Senior Rust Engineer",
        "https://itviec.com/it-jobs/rust-1",
        "https://itviec.com/it-jobs",
    );
    job.company = "FPT Software".into();
    job.location = vec!["Ha Noi".into(), "Ho Chi Minh".into()];
    job.tags = vec!["Rust".into(), "Tokio".into()];
    CrawlBatch::from_jobs(
        vec![job, JobRecord::new("QA", "https://topdev.vn/detail-jobs/qa-2", "https://topdev.vn/viec-lam-it")],
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
        42.5,
    )
}

#[tokio::test]
async fn saved_batch_loads_back_unchanged() {
    let dir = TempDir::new().unwrap();
    let batch = sample_batch();

    let path = save_batch(&batch, &dir.path().join("nested")).await.unwrap();

    assert_eq!(path.file_name().unwrap().to_str().unwrap(), "jobs_20240601_083000.json");
    assert_eq!(load_batch(&path).await.unwrap(), batch);
    // No temp files left next to the batch
    let entries = std::fs::read_dir(dir.path().join("nested")).unwrap().count();
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn newest_file_is_the_latest_batch() {
    let dir = TempDir::new().unwrap();
    assert!(latest_batch_file(dir.path()).await.is_none());
    assert!(load_latest_batch(dir.path()).await.unwrap().is_none());

    let older = sample_batch();
    save_batch(&older, dir.path()).await.unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));

    let newer = CrawlBatch::from_jobs(
        Vec::new(),
        Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 0).unwrap(),
        1.0,
    );
    let newer_path = save_batch(&newer, dir.path()).await.unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a batch").unwrap();

    assert_eq!(latest_batch_file(dir.path()).await, Some(newer_path));
    assert_eq!(load_latest_batch(dir.path()).await.unwrap(), Some(newer));
}

#[tokio::test]
async fn legacy_file_with_string_fields_is_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs_20230101_000000.json");
    std::fs::write(
        &path,
        r#"{
            "metadata": {"total_jobs": 1, "created_at": "2023-01-01T00:00:00", "execution_time": 12.0, "sources": {"https://itviec.com/it-jobs": 1}},
            "jobs": [{"title": "Dev", "location": "Da Nang", "experience": "3 years", "tags": [], "url": "https://itviec.com/it-jobs/dev"}]
        }"#,
    )
    .unwrap();

    let batch = load_batch(&path).await.unwrap();
    assert_eq!(batch.jobs[0].location, vec!["Da Nang"]);
    assert_eq!(batch.jobs[0].experience, vec!["3 years"]);
    assert_eq!(batch.jobs[0].source, "");
    assert_eq!(batch.metadata.total_jobs, 1);
}

#[test]
fn file_names_sort_by_timestamp() {
    let a = batch_file_name(Utc.with_ymd_and_hms(2024, 1, 9, 23, 0, 0).unwrap());
    let b = batch_file_name(Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap());
    assert!(a < b);
}
