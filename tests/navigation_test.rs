//! Challenge-aware navigation against scripted sessions

use jobhub_crawler::crawl_engine::RetryPolicy;
use jobhub_crawler::session::{NavigateOptions, navigate, try_navigate};
use jobhub_crawler::{SessionError, SessionFactory};
use std::time::Duration;

mod common;
use common::{ALWAYS, MockFactory, MockWeb};

const URL: &str = "https://itviec.com/it-jobs";

fn bypass() -> NavigateOptions {
    NavigateOptions {
        settle_wait: Duration::from_secs(1),
        settle_jitter: Duration::ZERO,
        challenge_bypass: true,
        challenge_wait: Duration::from_secs(5),
        retry: RetryPolicy::linear(3, Duration::from_secs(2)),
    }
}

#[tokio::test(start_paused = true)]
async fn challenge_that_clears_during_the_wait_succeeds_first_attempt() {
    let web = MockWeb::new();
    web.page(URL, "<div class='job-card'></div>").challenge(URL, 1);
    let session = MockFactory::new(web.clone()).create().await.unwrap();

    try_navigate(&session, URL, &bypass()).await.unwrap();
    assert_eq!(web.visits(URL), 1);
}

#[tokio::test(start_paused = true)]
async fn persistent_challenge_is_retried_then_reported() {
    let web = MockWeb::new();
    web.page(URL, "<div class='job-card'></div>").challenge(URL, ALWAYS);
    let session = MockFactory::new(web.clone()).create().await.unwrap();

    let err = try_navigate(&session, URL, &bypass()).await.unwrap_err();
    assert!(matches!(err, SessionError::Challenge(_)));
    assert_eq!(web.visits(URL), 3);
    assert!(!navigate(&session, URL, &bypass()).await);
}

#[tokio::test(start_paused = true)]
async fn challenge_cleared_on_a_later_attempt() {
    let web = MockWeb::new();
    // Two reads per attempt: the first attempt sees the challenge twice
    web.page(URL, "<div class='job-card'></div>").challenge(URL, 2);
    let session = MockFactory::new(web.clone()).create().await.unwrap();

    assert!(navigate(&session, URL, &bypass()).await);
    assert_eq!(web.visits(URL), 2);
}

#[tokio::test(start_paused = true)]
async fn crash_stops_retrying_immediately() {
    let web = MockWeb::new();
    web.page(URL, "<html></html>").crash(URL, 1);
    let session = MockFactory::new(web.clone()).create().await.unwrap();

    let err = try_navigate(&session, URL, &bypass()).await.unwrap_err();
    assert!(err.is_session_fatal());
    assert_eq!(web.visits(URL), 1);
}

#[tokio::test(start_paused = true)]
async fn plain_navigation_loads_once_without_challenge_checks() {
    let web = MockWeb::new();
    web.page(URL, "<div></div>").challenge(URL, ALWAYS);
    let session = MockFactory::new(web.clone()).create().await.unwrap();

    try_navigate(&session, URL, &NavigateOptions::plain(Duration::from_millis(100)))
        .await
        .unwrap();
    assert_eq!(web.visits(URL), 1);

    let err = try_navigate(&session, "https://itviec.com/missing", &NavigateOptions::plain(Duration::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Navigation { .. }));
}
