//! Navigation with anti-bot challenge handling
//!
//! Job boards sit behind a Cloudflare-style interstitial. A navigation attempt
//! loads the page, lets it settle, and checks the source for a challenge
//! marker; a marker that survives the extra challenge wait fails the attempt.

use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{BrowserSession, SessionError};
use crate::crawl_engine::retry_policy::RetryPolicy;
use crate::utils::{
    CHALLENGE_MARKERS, DEFAULT_CHALLENGE_WAIT, DEFAULT_NAVIGATION_ATTEMPTS,
    DEFAULT_NAVIGATION_BACKOFF, DEFAULT_SETTLE_WAIT,
};

#[derive(Debug, Clone, PartialEq)]
pub struct NavigateOptions {
    /// Wait after the load event before inspecting the page
    pub settle_wait: Duration,
    /// Upper bound of the random extra settle wait
    pub settle_jitter: Duration,
    /// Check for and wait out challenge pages, with retries
    pub challenge_bypass: bool,
    /// Extra wait when a challenge marker is present
    pub challenge_wait: Duration,
    /// Attempt budget and backoff between attempts (bypass mode only)
    pub retry: RetryPolicy,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            settle_wait: DEFAULT_SETTLE_WAIT,
            settle_jitter: DEFAULT_SETTLE_WAIT + Duration::from_secs(1),
            challenge_bypass: true,
            challenge_wait: DEFAULT_CHALLENGE_WAIT,
            retry: RetryPolicy::linear(DEFAULT_NAVIGATION_ATTEMPTS, DEFAULT_NAVIGATION_BACKOFF),
        }
    }
}

impl NavigateOptions {
    /// Single load with a settle wait and no challenge handling
    #[must_use]
    pub fn plain(settle_wait: Duration) -> Self {
        Self {
            settle_wait,
            settle_jitter: Duration::ZERO,
            challenge_bypass: false,
            ..Self::default()
        }
    }

    /// Longest a navigation can take when every attempt fails slowly
    ///
    /// Each load may run to `page_load_timeout`, settle with full jitter and
    /// wait out the challenge before the next backoff.
    #[must_use]
    pub fn worst_case(&self, page_load_timeout: Duration) -> Duration {
        let settle = self.settle_wait.saturating_add(self.settle_jitter);
        if !self.challenge_bypass {
            return page_load_timeout.saturating_add(settle);
        }
        page_load_timeout
            .saturating_add(settle)
            .saturating_add(self.challenge_wait)
            .saturating_mul(self.retry.attempts())
            .saturating_add(self.retry.worst_case_delay())
    }

    fn settle_duration(&self) -> Duration {
        let jitter_ms = u64::try_from(self.settle_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return self.settle_wait;
        }
        let extra = rand::rng().random_range(0..=jitter_ms);
        self.settle_wait + Duration::from_millis(extra)
    }
}

/// Whether the page source is a challenge interstitial
#[must_use]
pub fn is_challenge_page(html: &str) -> bool {
    let lower = html.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Navigate and report success as a boolean.
pub async fn navigate<S: BrowserSession>(session: &S, url: &str, options: &NavigateOptions) -> bool {
    match try_navigate(session, url, options).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Navigation to {url} failed: {e}");
            false
        }
    }
}

/// Navigate, returning the last failure when every attempt failed.
///
/// Errors that make the session unusable are returned immediately without
/// further attempts so the caller can replace the session.
pub async fn try_navigate<S: BrowserSession>(
    session: &S,
    url: &str,
    options: &NavigateOptions,
) -> Result<(), SessionError> {
    if !options.challenge_bypass {
        session.goto(url).await?;
        tokio::time::sleep(options.settle_duration()).await;
        return Ok(());
    }

    let attempts = options.retry.attempts();
    let mut last_error = SessionError::Challenge(url.to_string());

    for attempt in 1..=attempts {
        match attempt_once(session, url, options).await {
            Ok(()) => {
                if attempt > 1 {
                    info!("Reached {url} on attempt {attempt}/{attempts}");
                }
                return Ok(());
            }
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => {
                debug!("Attempt {attempt}/{attempts} for {url} failed: {e}");
                last_error = e;
            }
        }

        if options.retry.should_retry(attempt) {
            tokio::time::sleep(options.retry.delay_for(attempt)).await;
        }
    }

    Err(last_error)
}

async fn attempt_once<S: BrowserSession>(
    session: &S,
    url: &str,
    options: &NavigateOptions,
) -> Result<(), SessionError> {
    session.goto(url).await?;
    tokio::time::sleep(options.settle_duration()).await;

    if !is_challenge_page(&session.content().await?) {
        return Ok(());
    }

    debug!("Challenge page on {url}, waiting {:?}", options.challenge_wait);
    tokio::time::sleep(options.challenge_wait).await;

    if is_challenge_page(&session.content().await?) {
        Err(SessionError::Challenge(url.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_challenge_markers_case_insensitively() {
        assert!(is_challenge_page("<title>Just a moment...</title>"));
        assert!(is_challenge_page("<p>Checking your browser before accessing itviec.com</p>"));
        assert!(!is_challenge_page("<div class=\"job-card\"></div>"));
    }

    #[test]
    fn plain_options_have_no_jitter() {
        let options = NavigateOptions::plain(Duration::from_millis(10));
        assert_eq!(options.settle_duration(), Duration::from_millis(10));
        assert!(!options.challenge_bypass);
    }
}
