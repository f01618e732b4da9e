//! Process-wide registry of open browser sessions
//!
//! Every Chrome launched by this process is recorded here until it is closed.
//! [`SessionRegistry::sweep`] kills whatever is still open; it runs when the
//! [`RegistryGuard`] returned by [`install`] is dropped (normal exit or
//! unwinding) and from the Ctrl-C handler.

use chromiumoxide::Browser;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cleanup::{CleanupResult, cleanup_browser_and_data};
use crate::browser_profile::remove_profile_dir;

static GLOBAL: LazyLock<SessionRegistry> = LazyLock::new(SessionRegistry::new);

/// Resources owned by one session: the browser process, its CDP handler task
/// and its profile directory
#[derive(Debug)]
pub(crate) struct SessionSlot {
    id: u64,
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    profile_dir: PathBuf,
}

impl SessionSlot {
    pub(crate) fn new(
        id: u64,
        browser: Option<Browser>,
        handler: Option<JoinHandle<()>>,
        profile_dir: PathBuf,
    ) -> Self {
        Self {
            id,
            browser: Mutex::new(browser),
            handler: Mutex::new(handler),
            profile_dir,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }

    /// Graceful close: CDP close, wait for exit, stop handler, remove dir
    pub(crate) async fn shutdown(&self) -> CleanupResult {
        let browser = self.browser.lock().take();
        let handler = self.handler.lock().take();
        match browser {
            Some(browser) => cleanup_browser_and_data(browser, handler, &self.profile_dir).await,
            None => {
                if let Some(handler) = handler {
                    handler.abort();
                }
                remove_profile_dir(&self.profile_dir);
                CleanupResult::Success
            }
        }
    }

    /// Synchronous teardown for exit paths where nothing can be awaited.
    ///
    /// Dropping a `Browser` that was not closed kills its child process.
    pub(crate) fn kill(&self) {
        drop(self.browser.lock().take());
        if let Some(handler) = self.handler.lock().take() {
            handler.abort();
        }
        remove_profile_dir(&self.profile_dir);
    }
}

/// Mutex-protected map of open sessions keyed by session id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: Mutex<HashMap<u64, Arc<SessionSlot>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by every Chrome session of this process
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    pub(crate) fn register(&self, slot: Arc<SessionSlot>) {
        debug!("Registering session {}", slot.id());
        self.slots.lock().insert(slot.id(), slot);
    }

    pub(crate) fn deregister(&self, id: u64) -> Option<Arc<SessionSlot>> {
        self.slots.lock().remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Kill every session still registered. Returns how many were open.
    pub fn sweep(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in &slots {
            warn!(
                "Session {} still open at exit, killing it ({})",
                slot.id(),
                slot.profile_dir().display()
            );
            slot.kill();
        }
        slots.len()
    }
}

/// Sweeps the global registry when dropped
#[must_use = "open sessions are only swept when the guard is dropped"]
#[derive(Debug)]
pub struct RegistryGuard {
    _private: (),
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        let swept = SessionRegistry::global().sweep();
        if swept > 0 {
            info!("Exit sweep closed {swept} browser sessions");
        }
    }
}

/// Install the exit hooks for the global registry.
///
/// Must be called from within a tokio runtime for the Ctrl-C hook to be armed.
pub fn install() -> RegistryGuard {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                let swept = SessionRegistry::global().sweep();
                warn!("Interrupted, closed {swept} browser sessions");
                std::process::exit(130);
            }
        });
    } else {
        warn!("No tokio runtime, Ctrl-C cleanup hook not installed");
    }
    RegistryGuard { _private: () }
}
