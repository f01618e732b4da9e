//! Data model shared by the crawl phases, the diff engine and persistence.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::utils::{dedup_preserving_order, normalize_whitespace};

/// One job posting extracted from a detail page
///
/// `url` is the identity key across runs. `location` and `experience` are
/// always lists; files written by older crawlers stored them as plain strings
/// and are normalized on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub company: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub location: Vec<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub salary: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub posted_at: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub experience: Vec<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub level: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub tags: Vec<String>,
    pub url: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub source: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
}

impl JobRecord {
    /// Start a record with its identity fields; everything else is empty.
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: String::new(),
            location: Vec::new(),
            salary: String::new(),
            posted_at: String::new(),
            experience: Vec::new(),
            level: String::new(),
            tags: Vec::new(),
            url: url.into(),
            source: source.into(),
            description: String::new(),
        }
    }

    /// Trim scalar fields, drop blank list entries and de-duplicate lists
    /// keeping first occurrences.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.title = normalize_whitespace(&self.title);
        self.company = normalize_whitespace(&self.company);
        self.salary = normalize_whitespace(&self.salary);
        self.posted_at = normalize_whitespace(&self.posted_at);
        self.level = normalize_whitespace(&self.level);
        self.description = self.description.trim().to_string();
        self.location = clean_list(self.location);
        self.experience = clean_list(self.experience);
        self.tags = clean_list(self.tags);
        self
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    dedup_preserving_order(
        items
            .iter()
            .map(|s| normalize_whitespace(s))
            .filter(|s| !s.is_empty()),
    )
}

/// A detail-page URL discovered during the listing phase
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateUrl {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

impl CandidateUrl {
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Summary stored alongside the jobs of a persisted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    #[serde(default)]
    pub total_jobs: usize,
    #[serde(deserialize_with = "flexible_datetime")]
    pub created_at: DateTime<Utc>,
    /// Wall-clock seconds spent producing the batch
    #[serde(default, deserialize_with = "nullable_f64")]
    pub execution_time: f64,
    #[serde(default)]
    pub sources: BTreeMap<String, usize>,
}

/// The unit of persistence: one run's records plus derived metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlBatch {
    pub metadata: BatchMetadata,
    pub jobs: Vec<JobRecord>,
}

impl CrawlBatch {
    /// Build a batch whose `total_jobs` and `sources` are derived from `jobs`.
    #[must_use]
    pub fn from_jobs(jobs: Vec<JobRecord>, created_at: DateTime<Utc>, execution_time: f64) -> Self {
        let metadata = BatchMetadata {
            total_jobs: jobs.len(),
            created_at,
            execution_time,
            sources: count_sources(&jobs),
        };
        Self { metadata, jobs }
    }

    /// URLs of every job in the batch
    #[must_use]
    pub fn urls(&self) -> HashSet<String> {
        self.jobs.iter().map(|j| j.url.clone()).collect()
    }

    /// Whether the metadata agrees with the job list
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.metadata.total_jobs == self.jobs.len()
            && self.metadata.sources.values().sum::<usize>() == self.jobs.len()
            && self.metadata.sources == count_sources(&self.jobs)
    }
}

fn count_sources(jobs: &[JobRecord]) -> BTreeMap<String, usize> {
    let mut sources = BTreeMap::new();
    for job in jobs {
        *sources.entry(job.source.clone()).or_insert(0) += 1;
    }
    sources
}

// =============================================================================
// Lenient deserializers for files written by earlier crawler versions
// =============================================================================

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<Option<String>>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOrList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrList::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(StringOrList::One(s)) => vec![s],
        Some(StringOrList::Many(items)) => items.into_iter().flatten().collect(),
    })
}

fn flexible_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Parse RFC 3339 or a naive ISO-8601 timestamp (taken as UTC).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn legacy_record_with_string_location_loads_as_list() {
        let json = r#"{
            "title": "Backend Developer",
            "company": null,
            "location": "Ha Noi",
            "experience": null,
            "tags": ["Go", "Go", "Docker"],
            "url": "https://topdev.vn/detail-jobs/backend-developer-2001"
        }"#;
        let job: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(job.location, vec!["Ha Noi"]);
        assert!(job.experience.is_empty());
        assert_eq!(job.company, "");

        let job = job.normalized();
        assert_eq!(job.tags, vec!["Go", "Docker"]);
    }

    #[test]
    fn metadata_accepts_naive_timestamp_and_null_execution_time() {
        let json = r#"{
            "total_jobs": 0,
            "created_at": "2024-05-01T10:20:30.123456",
            "execution_time": null,
            "sources": {}
        }"#;
        let meta: BatchMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.execution_time, 0.0);
        assert_eq!(
            meta.created_at.timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap().timestamp()
        );
    }

    #[test]
    fn from_jobs_derives_metadata() {
        let jobs = vec![
            JobRecord::new("A", "https://itviec.com/it-jobs/a", "https://itviec.com/it-jobs"),
            JobRecord::new("B", "https://itviec.com/it-jobs/b", "https://itviec.com/it-jobs"),
            JobRecord::new("C", "https://topdev.vn/detail-jobs/c", "https://topdev.vn/viec-lam-it"),
        ];
        let batch = CrawlBatch::from_jobs(jobs, Utc::now(), 1.5);
        assert_eq!(batch.metadata.total_jobs, 3);
        assert_eq!(batch.metadata.sources["https://itviec.com/it-jobs"], 2);
        assert!(batch.is_consistent());
    }
}
