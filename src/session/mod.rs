//! Browser session management
//!
//! A session is one automated Chrome instance with a single page. Sessions are
//! created through a [`SessionFactory`] so the pool and both crawl phases can
//! run against real Chrome in production and against scripted sessions in
//! tests.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

mod chrome;
mod cleanup;
mod error;
pub mod navigation;
pub mod page_timeout;
pub mod registry;

pub use chrome::{ChromeSession, ChromeSessionFactory, create_session};
pub use cleanup::{CleanupResult, cleanup_browser_and_data};
pub use error::SessionError;
pub use navigation::{NavigateOptions, is_challenge_page, navigate, try_navigate};
pub use registry::{RegistryGuard, SessionRegistry};

use crate::utils::{DEFAULT_PAGE_LOAD_TIMEOUT, USER_AGENTS, CHROME_USER_AGENT};

/// Launch options for a browser session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub headless: bool,
    /// Fixed user agent; a random one from [`USER_AGENTS`] when `None`
    pub user_agent: Option<String>,
    pub window_size: (u32, u32),
    /// Register the stealth script set on the session's page
    pub anti_detection: bool,
    /// Timeout for individual CDP requests
    pub request_timeout: Duration,
    /// Timeout for a single page load
    pub page_load_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: None,
            window_size: (1920, 1080),
            anti_detection: true,
            request_timeout: Duration::from_secs(30),
            page_load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
        }
    }
}

impl SessionOptions {
    /// The configured user agent, or a random desktop one
    #[must_use]
    pub fn resolve_user_agent(&self) -> String {
        use rand::seq::IndexedRandom;

        self.user_agent.clone().unwrap_or_else(|| {
            USER_AGENTS
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or(CHROME_USER_AGENT)
                .to_string()
        })
    }
}

/// Primitive operations the crawl phases need from a browser session
///
/// Implementations must be safe to move between worker tasks; a session is
/// only ever used by one task at a time (the pool guarantees exclusivity).
pub trait BrowserSession: Send + Sync + 'static {
    /// Process-unique identifier, used in logs
    fn id(&self) -> u64;

    /// Load `url` and wait for the load event, bounded by the page-load timeout
    fn goto(&self, url: &str) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Current serialized DOM
    fn content(&self) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Poll until `selector` matches or `timeout` passes
    fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Scroll until the document height stops growing or `max_rounds` is hit.
    /// Returns the number of scroll rounds performed.
    fn scroll_to_bottom(
        &self,
        delay: Duration,
        max_rounds: u32,
    ) -> impl Future<Output = Result<u32, SessionError>> + Send;

    /// Cheap liveness probe
    fn is_alive(&self) -> impl Future<Output = bool> + Send;

    /// Terminate the browser and release its resources. Idempotent.
    fn close(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Creates sessions for the pool
pub trait SessionFactory: Send + Sync + 'static {
    type Session: BrowserSession;

    fn create(&self) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;
}
