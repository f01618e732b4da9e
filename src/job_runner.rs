//! Run coordinator: drives every configured crawler end to end and finalizes
//! the batch.
//!
//! Crawlers run concurrently, each with its own session pool. A crawler that
//! fails or panics contributes no records and does not affect the others.

use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::browser_pool::SessionPool;
use crate::config::{CrawlerConfig, RunConfig};
use crate::content_saver::{load_latest_batch, save_batch};
use crate::crawl_engine::{
    CounterSnapshot, CrawlCounters, CrawlError, CrawlResult, DetailOptions, ListingOptions,
    browser_like_client, collect_candidates, fetch_details,
};
use crate::incremental::{diff, load_previous_urls, merge};
use crate::page_extractor::schema::{CrawlBatch, JobRecord};
use crate::session::SessionFactory;
use crate::sites::SiteProfile;

/// Outcome of one crawler
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlerReport {
    pub site: String,
    /// Candidates found by the listing phase
    pub candidates: usize,
    /// Candidates not present in the previous batch
    pub new_candidates: usize,
    pub records: usize,
    pub dropped: usize,
    pub counters: CounterSnapshot,
    /// Crawler-level failure, if the crawler did not complete
    pub error: Option<String>,
    pub elapsed_secs: f64,
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub batch: CrawlBatch,
    /// Page, candidate and crawler-level errors across the run
    pub errors: usize,
    pub per_crawler: Vec<CrawlerReport>,
}

/// Summary statistics over a set of records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub total_jobs: usize,
    pub unique_companies: usize,
    pub unique_locations: usize,
    /// Most frequent tags, highest count first
    pub top_tags: Vec<(String, usize)>,
}

impl fmt::Display for JobStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total jobs: {}", self.total_jobs)?;
        writeln!(f, "Companies: {}", self.unique_companies)?;
        writeln!(f, "Locations: {}", self.unique_locations)?;
        if !self.top_tags.is_empty() {
            let tags: Vec<String> = self
                .top_tags
                .iter()
                .map(|(tag, count)| format!("{tag} ({count})"))
                .collect();
            write!(f, "Top tags: {}", tags.join(", "))?;
        }
        Ok(())
    }
}

/// Statistics over `jobs`; ties between tags are ordered by name
#[must_use]
pub fn summarize(jobs: &[JobRecord], top_n: usize) -> JobStats {
    let companies: HashSet<&str> = jobs
        .iter()
        .map(|j| j.company.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    let locations: HashSet<&str> = jobs
        .iter()
        .flat_map(|j| j.location.iter().map(String::as_str))
        .collect();

    let mut tag_counts: HashMap<&str, usize> = HashMap::new();
    for tag in jobs.iter().flat_map(|j| j.tags.iter()) {
        *tag_counts.entry(tag.as_str()).or_insert(0) += 1;
    }
    let mut top_tags: Vec<(String, usize)> = tag_counts
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_tags.truncate(top_n);

    JobStats {
        total_jobs: jobs.len(),
        unique_companies: companies.len(),
        unique_locations: locations.len(),
        top_tags,
    }
}

pub struct JobRunner<F: SessionFactory + Clone> {
    config: Arc<RunConfig>,
    factory: F,
    http: reqwest::Client,
}

impl<F: SessionFactory + Clone> JobRunner<F> {
    /// Runner with a browser-like HTTP client for detail fetches
    pub fn new(config: RunConfig, factory: F) -> Result<Self> {
        let http = browser_like_client(config.http_timeout())?;
        Ok(Self::with_http_client(config, factory, http))
    }

    #[must_use]
    pub fn with_http_client(config: RunConfig, factory: F, http: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            factory,
            http,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the crawlers from the configuration
    pub async fn run_configured(&self) -> RunReport {
        let crawlers = self.config.crawlers().to_vec();
        self.run(&crawlers).await
    }

    /// Run `crawlers` concurrently and build the run's batch.
    ///
    /// Always returns a batch, empty when every crawler failed.
    pub async fn run(&self, crawlers: &[CrawlerConfig]) -> RunReport {
        let started = Instant::now();
        let previous = Arc::new(load_previous_urls(self.config.output_dir()).await);
        info!(known_urls = previous.len(), crawlers = crawlers.len(), "Starting run");

        let records = Arc::new(Mutex::new(Vec::new()));
        let mut per_crawler = Vec::with_capacity(crawlers.len());
        let mut handles = Vec::with_capacity(crawlers.len());

        for crawler in crawlers {
            let Some(site) = crawler.site_profile() else {
                error!(site = %crawler.site, "Unknown site, skipping crawler");
                per_crawler.push(CrawlerReport {
                    site: crawler.site.clone(),
                    error: Some(
                        CrawlError::ConfigError(format!("unknown site '{}'", crawler.site))
                            .to_string(),
                    ),
                    ..CrawlerReport::default()
                });
                continue;
            };

            let task = CrawlerTask {
                site,
                capacity: crawler.max_concurrency,
                listing: self.config.listing_options(crawler),
                detail: self.config.detail_options(crawler),
                factory: self.factory.clone(),
                http: self.http.clone(),
                previous: Arc::clone(&previous),
                records: Arc::clone(&records),
            };
            handles.push((crawler.site.clone(), tokio::spawn(task.run())));
        }

        for (site, handle) in handles {
            match handle.await {
                Ok(report) => per_crawler.push(report),
                Err(e) => {
                    error!(%site, "Crawler task panicked: {e}");
                    per_crawler.push(CrawlerReport {
                        site,
                        error: Some(format!("crawler task panicked: {e}")),
                        ..CrawlerReport::default()
                    });
                }
            }
        }

        let jobs = std::mem::take(&mut *records.lock());
        let batch = CrawlBatch::from_jobs(jobs, Utc::now(), started.elapsed().as_secs_f64());
        let errors: usize = per_crawler
            .iter()
            .map(|r| r.counters.errors + usize::from(r.error.is_some()))
            .sum();

        info!(
            jobs = batch.jobs.len(),
            errors,
            elapsed_secs = batch.metadata.execution_time,
            "Run finished"
        );
        RunReport {
            batch,
            errors,
            per_crawler,
        }
    }

    /// Save the run's batch into the output directory.
    ///
    /// With `consolidate` the newest previous batch is merged underneath the
    /// new one first; an unreadable previous batch is skipped with a warning.
    pub async fn persist(&self, report: &RunReport, consolidate: bool) -> Result<PathBuf> {
        let output_dir = self.config.output_dir();
        let batch = if consolidate {
            match load_latest_batch(output_dir).await {
                Ok(Some(previous)) => {
                    info!(
                        previous = previous.jobs.len(),
                        new = report.batch.jobs.len(),
                        "Consolidating with previous batch"
                    );
                    merge(previous, report.batch.clone())
                }
                Ok(None) => report.batch.clone(),
                Err(e) => {
                    warn!("Previous batch unreadable, saving this run alone: {e:#}");
                    report.batch.clone()
                }
            }
        } else {
            report.batch.clone()
        };

        save_batch(&batch, output_dir).await
    }
}

/// Everything one crawler task owns
struct CrawlerTask<F: SessionFactory> {
    site: SiteProfile,
    capacity: usize,
    listing: ListingOptions,
    detail: DetailOptions,
    factory: F,
    http: reqwest::Client,
    previous: Arc<HashSet<String>>,
    records: Arc<Mutex<Vec<JobRecord>>>,
}

impl<F: SessionFactory> CrawlerTask<F> {
    async fn run(self) -> CrawlerReport {
        let started = Instant::now();
        let counters = Arc::new(CrawlCounters::new());
        let pool = SessionPool::new(self.factory, self.capacity);
        info!(site = self.site.name, capacity = self.capacity, "Starting crawler");

        let mut report = CrawlerReport {
            site: self.site.name.to_string(),
            ..CrawlerReport::default()
        };

        let outcome: CrawlResult<()> = async {
            let candidates = collect_candidates(&pool, &self.site, &self.listing, &counters).await?;
            report.candidates = candidates.len();

            let fresh = diff(&self.previous, &candidates);
            report.new_candidates = fresh.len();
            info!(
                site = self.site.name,
                found = candidates.len(),
                new = fresh.len(),
                "Listing phase done"
            );

            let details =
                fetch_details(&pool, &self.site, fresh, &self.detail, &counters, &self.http)
                    .await;
            report.records = details.records.len();
            report.dropped = details.dropped.len();
            self.records.lock().extend(details.records);
            Ok(())
        }
        .await;

        if let Err(e) = outcome {
            error!(site = self.site.name, "Crawler failed: {e}");
            report.error = Some(e.to_string());
        }

        let closed = pool.shutdown().await;
        report.counters = counters.snapshot();
        report.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            site = self.site.name,
            records = report.records,
            dropped = report.dropped,
            closed_sessions = closed,
            "Crawler finished"
        );
        report
    }
}
