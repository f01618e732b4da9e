//! Chrome-backed [`BrowserSession`] built on chromiumoxide.

use chromiumoxide::Page;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::page_timeout::with_page_timeout;
use super::cleanup::cleanup_browser_and_data;
use super::registry::{SessionRegistry, SessionSlot};
use super::{BrowserSession, SessionError, SessionFactory, SessionOptions};
use crate::browser_profile::create_unique_profile_with_prefix;
use crate::browser_setup::launch_browser;
use crate::kromekover;
use crate::utils::PROFILE_DIR_PREFIX;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);
const LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One Chrome process with a single page
///
/// Registered in the global [`SessionRegistry`] from launch until `close()`;
/// dropping an unclosed session kills the process and removes its profile.
#[derive(Debug)]
pub struct ChromeSession {
    id: u64,
    page: Page,
    slot: Arc<SessionSlot>,
    page_load_timeout: Duration,
    request_timeout: Duration,
    closed: AtomicBool,
}

/// Launch a new Chrome session.
///
/// Launch failures are returned as [`SessionError::Launch`] and are not retried
/// here; the pool decides whether to try again.
pub async fn create_session(options: &SessionOptions) -> Result<ChromeSession, SessionError> {
    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    let profile = create_unique_profile_with_prefix(PROFILE_DIR_PREFIX)
        .map_err(|e| SessionError::Profile(format!("{e:#}")))?;
    let user_agent = options.resolve_user_agent();

    let (browser, handler) = launch_browser(options, &user_agent, profile.path())
        .await
        .map_err(|e| SessionError::Launch(format!("{e:#}")))?;

    let opened = with_page_timeout(
        async {
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| SessionError::from_cdp("about:blank", e))
        },
        options.request_timeout,
        "open page",
    )
    .await;
    let page = match opened {
        Ok(page) => page,
        Err(e) => {
            cleanup_browser_and_data(browser, Some(handler), profile.path()).await;
            return Err(e);
        }
    };

    let slot = Arc::new(SessionSlot::new(
        id,
        Some(browser),
        Some(handler),
        profile.into_path(),
    ));
    SessionRegistry::global().register(Arc::clone(&slot));

    // From here on, Drop of the session releases everything if we are cancelled
    let session = ChromeSession {
        id,
        page,
        slot,
        page_load_timeout: options.page_load_timeout,
        request_timeout: options.request_timeout,
        closed: AtomicBool::new(false),
    };

    if options.anti_detection {
        let stealth = kromekover::Config::for_user_agent(&user_agent, options.window_size);
        if let Err(e) = kromekover::inject(&session.page, &stealth).await {
            warn!("Session {id}: stealth injection failed: {e:#}");
        }
    }

    info!("Session {id} ready ({})", session.slot.profile_dir().display());
    Ok(session)
}

impl ChromeSession {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    async fn height(&self) -> Result<u64, SessionError> {
        let result = with_page_timeout(
            async {
                self.page
                    .evaluate("document.body ? document.body.scrollHeight : 0")
                    .await
                    .map_err(|e| SessionError::from_cdp("scroll", e))
            },
            self.request_timeout,
            "scroll height",
        )
        .await?;
        result
            .into_value::<u64>()
            .map_err(|e| SessionError::Script(e.to_string()))
    }
}

impl BrowserSession for ChromeSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn goto(&self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        debug!("Session {} -> {}", self.id, url);
        with_page_timeout(
            async {
                self.page
                    .goto(url)
                    .await
                    .map(|_| ())
                    .map_err(|e| SessionError::from_cdp(url, e))
            },
            self.page_load_timeout,
            "page load",
        )
        .await
    }

    async fn content(&self) -> Result<String, SessionError> {
        self.ensure_open()?;
        with_page_timeout(
            async {
                self.page
                    .content()
                    .await
                    .map_err(|e| SessionError::from_cdp("content", e))
            },
            self.request_timeout,
            "read content",
        )
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), SessionError> {
        self.ensure_open()?;
        let deadline = Instant::now() + timeout;
        loop {
            match self.page.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    let err = SessionError::from_cdp(selector, e);
                    if err.is_session_fatal() {
                        return Err(err);
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(SessionError::ElementMissing(selector.to_string()));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn scroll_to_bottom(&self, delay: Duration, max_rounds: u32) -> Result<u32, SessionError> {
        self.ensure_open()?;
        let mut last_height = self.height().await?;
        let mut rounds = 0;

        while rounds < max_rounds {
            self.page
                .evaluate("window.scrollTo(0, document.body.scrollHeight)")
                .await
                .map_err(|e| SessionError::from_cdp("scroll", e))?;
            rounds += 1;
            tokio::time::sleep(delay).await;

            let new_height = self.height().await?;
            if new_height == last_height {
                break;
            }
            last_height = new_height;
        }
        debug!("Session {} scrolled {} rounds", self.id, rounds);
        Ok(rounds)
    }

    async fn is_alive(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        matches!(
            tokio::time::timeout(LIVENESS_TIMEOUT, self.page.evaluate("1")).await,
            Ok(Ok(_))
        )
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        SessionRegistry::global().deregister(self.id);
        match self.slot.shutdown().await {
            super::CleanupResult::Success => {
                debug!("Session {} closed", self.id);
                Ok(())
            }
            super::CleanupResult::PartialFailure(errors) => {
                // Resources are released either way; report for logging only
                warn!("Session {} closed with errors: {:?}", self.id, errors);
                Ok(())
            }
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            SessionRegistry::global().deregister(self.id);
            self.slot.kill();
        }
    }
}

/// Launches a fresh [`ChromeSession`] per request
#[derive(Debug, Clone, Default)]
pub struct ChromeSessionFactory {
    options: SessionOptions,
}

impl ChromeSessionFactory {
    #[must_use]
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn create(&self) -> Result<ChromeSession, SessionError> {
        create_session(&self.options).await
    }
}
