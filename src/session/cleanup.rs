//! Browser teardown

use chromiumoxide::Browser;
use log::{debug, warn};
use std::path::Path;
use tokio::task::JoinHandle;

/// Result of cleanup operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResult {
    /// All cleanup operations succeeded
    Success,
    /// Some cleanup operations failed, with error details
    PartialFailure(Vec<String>),
}

/// Close the browser, wait for the process to exit, stop its CDP handler and
/// remove its profile directory.
///
/// Order matters: the handler must keep running until `close()` has been
/// acknowledged, otherwise the close command never reaches Chrome.
pub async fn cleanup_browser_and_data(
    mut browser: Browser,
    handler: Option<JoinHandle<()>>,
    profile_dir: &Path,
) -> CleanupResult {
    let mut errors = Vec::new();

    debug!(target: "jobhub::cleanup", "Closing browser");
    if let Err(e) = browser.close().await {
        warn!(target: "jobhub::cleanup", "Failed to close browser: {e}");
        errors.push(format!("Browser close failed: {e}"));
    }

    if let Err(e) = browser.wait().await {
        warn!(target: "jobhub::cleanup", "Failed to wait for browser exit: {e}");
        errors.push(format!("Browser wait failed: {e}"));
    }

    if let Some(handler) = handler {
        handler.abort();
    }

    if profile_dir.exists()
        && let Err(e) = tokio::fs::remove_dir_all(profile_dir).await
    {
        warn!(target: "jobhub::cleanup", "Failed to remove profile directory: {e}");
        errors.push(format!("Directory cleanup failed: {e}"));
    }

    if errors.is_empty() {
        CleanupResult::Success
    } else {
        CleanupResult::PartialFailure(errors)
    }
}
