//! Tests for the type-safe run configuration builder

use jobhub_crawler::config::{CrawlerConfig, MAX_CRAWLER_CONCURRENCY, RunConfig};
use jobhub_crawler::crawl_engine::BackoffScale;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn builder_requires_output_dir() {
    // Does not compile without an output directory:
    // let config = RunConfig::builder().build();

    let temp_dir = TempDir::new().unwrap();
    let config = RunConfig::builder()
        .output_dir(temp_dir.path())
        .build()
        .unwrap();

    assert_eq!(config.output_dir(), temp_dir.path());
}

#[test]
fn defaults_cover_every_site() {
    let temp_dir = TempDir::new().unwrap();
    let config = RunConfig::builder()
        .output_dir(temp_dir.path())
        .build()
        .unwrap();

    let sites: Vec<&str> = config.crawlers().iter().map(|c| c.site.as_str()).collect();
    assert_eq!(sites, vec!["itviec", "topdev"]);
    assert!(config.consolidate());
    assert!(config.headless());
    assert!(config.anti_detection());
    assert_eq!(config.user_agent(), None);
    assert_eq!(config.top_tags(), 10);
}

#[test]
fn relative_output_dir_is_made_absolute() {
    let config = RunConfig::builder()
        .output_dir("output")
        .build()
        .unwrap();

    assert!(config.output_dir().is_absolute());
    assert!(config.output_dir().ends_with("output"));
}

#[test]
fn builder_methods_work_in_any_order() {
    let temp_dir = TempDir::new().unwrap();
    let config = RunConfig::builder()
        .headless(false)
        .crawler(CrawlerConfig::new("itviec").max_concurrency(2))
        .output_dir(temp_dir.path())
        .user_agent("TestAgent/1.0")
        .anti_detection(false)
        .consolidate(false)
        .page_load_timeout_secs(45)
        .max_pages(20)
        .build()
        .unwrap();

    assert!(!config.headless());
    assert!(!config.anti_detection());
    assert!(!config.consolidate());
    assert_eq!(config.user_agent(), Some("TestAgent/1.0"));
    assert_eq!(config.page_load_timeout(), Duration::from_secs(45));
    assert_eq!(config.max_pages(), 20);
    assert_eq!(config.crawlers().len(), 1);
}

#[test]
fn crawler_settings_flow_into_phase_options() {
    let temp_dir = TempDir::new().unwrap();
    let crawler = CrawlerConfig::new("topdev")
        .max_concurrency(6)
        .max_attempts(5)
        .retry_delay_ms(500)
        .backoff(BackoffScale::Fixed)
        .sweep_attempts(2);
    let config = RunConfig::builder()
        .output_dir(temp_dir.path())
        .crawler(crawler.clone())
        .selector_timeout_secs(7)
        .build()
        .unwrap();

    let listing = config.listing_options(&crawler);
    assert_eq!(listing.workers, 6);
    assert_eq!(listing.selector_timeout, Duration::from_secs(7));

    let detail = config.detail_options(&crawler);
    // Detail concurrency follows the pool size unless set
    assert_eq!(detail.concurrency, 6);
    assert_eq!(detail.retry.max_attempts, 5);
    assert_eq!(detail.retry.delay_for(3), Duration::from_millis(500));
    assert_eq!(detail.sweep_attempts, 2);

    let capped = crawler.clone().detail_concurrency(3);
    assert_eq!(config.detail_options(&capped).concurrency, 3);
    // More detail tasks than pooled sessions is clamped to the pool
    let oversized = crawler.detail_concurrency(10);
    assert_eq!(config.detail_options(&oversized).concurrency, 6);
    assert_eq!(crawler_site(&capped), "topdev");
}

#[test]
fn detail_deadlines_follow_run_timeouts_and_attempts() {
    let temp_dir = TempDir::new().unwrap();
    let build = |page_load: u64, attempts: u32| {
        let crawler = CrawlerConfig::new("itviec").max_attempts(attempts);
        let config = RunConfig::builder()
            .output_dir(temp_dir.path())
            .crawler(crawler.clone())
            .page_load_timeout_secs(page_load)
            .http_timeout_secs(20)
            .build()
            .unwrap();
        config.detail_options(&crawler)
    };

    let detail = build(45, 3);
    assert_eq!(detail.page_load_timeout, Duration::from_secs(45));
    assert_eq!(detail.http_timeout, Duration::from_secs(20));

    let baseline = detail.task_deadline(&detail.retry);
    let slower = build(90, 3);
    assert!(slower.task_deadline(&slower.retry) > baseline);
    let patient = build(45, 10);
    assert!(patient.task_deadline(&patient.retry) > baseline);
    // Every attempt fits, whatever the budget
    assert!(patient.task_deadline(&patient.retry) >= patient.attempt_timeout() * 10);
}

fn crawler_site(crawler: &CrawlerConfig) -> &'static str {
    crawler.site_profile().map(|s| s.name).unwrap_or("unknown")
}

#[test]
fn session_options_mirror_run_settings() {
    let temp_dir = TempDir::new().unwrap();
    let config = RunConfig::builder()
        .output_dir(temp_dir.path())
        .headless(false)
        .user_agent("UA")
        .build()
        .unwrap();

    let session = config.session_options();
    assert!(!session.headless);
    assert_eq!(session.user_agent.as_deref(), Some("UA"));
    assert_eq!(session.page_load_timeout, config.page_load_timeout());
}

#[test]
fn invalid_values_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let build = |crawler: CrawlerConfig| {
        RunConfig::builder()
            .output_dir(temp_dir.path())
            .crawler(crawler)
            .build()
    };

    assert!(build(CrawlerConfig::new("vietnamworks")).is_err());
    assert!(build(CrawlerConfig::new("itviec").max_concurrency(0)).is_err());
    assert!(build(CrawlerConfig::new("itviec").max_concurrency(MAX_CRAWLER_CONCURRENCY + 1)).is_err());
    assert!(build(CrawlerConfig::new("itviec").max_attempts(0)).is_err());
    assert!(build(CrawlerConfig::new("itviec").detail_concurrency(0)).is_err());

    let twice = RunConfig::builder()
        .output_dir(temp_dir.path())
        .crawler(CrawlerConfig::new("itviec"))
        .crawler(CrawlerConfig::new("ITviec"))
        .build();
    assert!(twice.is_err());

    let no_pages = RunConfig::builder()
        .output_dir(temp_dir.path())
        .max_pages(0)
        .build();
    assert!(no_pages.is_err());

    let no_timeout = RunConfig::builder()
        .output_dir(temp_dir.path())
        .http_timeout_secs(0)
        .build();
    assert!(no_timeout.is_err());
}
