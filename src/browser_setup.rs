use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tokio::sync::OnceCell;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, trace, warn};

use crate::session::SessionOptions;

static BROWSER_EXECUTABLE: OnceCell<PathBuf> = OnceCell::const_new();

/// Find Chrome/Chromium on the system.
///
/// `CHROMIUM_PATH` wins over the platform search paths and `which`.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!("CHROMIUM_PATH points to a missing file: {}", path.display());
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        info!("Found browser at: {}", path.display());
        return Ok(path);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output()
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    info!("Found browser using 'which': {}", path_str);
                    return Ok(PathBuf::from(path_str));
                }
            }
        }
    }

    Err(anyhow::anyhow!("Chrome/Chromium executable not found"))
}

/// Download a managed Chromium into the user cache directory.
pub async fn download_managed_browser() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("jobhub_crawler")
        .join("chromium");

    tokio::fs::create_dir_all(&cache_dir)
        .await
        .context("Failed to create browser cache directory")?;

    info!("Downloading managed Chromium into {}", cache_dir.display());
    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision_info = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!(
        "Downloaded Chromium to: {}",
        revision_info.folder_path.display()
    );
    Ok(revision_info.executable_path)
}

/// Resolve the browser once per process; concurrent sessions share the lookup
/// (and at most one download).
pub async fn browser_executable() -> Result<PathBuf> {
    BROWSER_EXECUTABLE
        .get_or_try_init(|| async {
            match find_browser_executable() {
                Ok(path) => Ok(path),
                Err(e) => {
                    warn!("{e}; falling back to a managed download");
                    download_managed_browser().await
                }
            }
        })
        .await
        .cloned()
}

/// Launch Chrome with automation fingerprints disabled.
///
/// The returned handler task drives the CDP connection and must be aborted
/// when the browser is closed.
pub async fn launch_browser(
    options: &SessionOptions,
    user_agent: &str,
    profile_dir: &Path,
) -> Result<(Browser, JoinHandle<()>)> {
    let chrome_path = browser_executable().await?;
    let (width, height) = options.window_size;

    let mut config_builder = BrowserConfigBuilder::default()
        .request_timeout(options.request_timeout)
        .window_size(width, height)
        .user_data_dir(profile_dir)
        .chrome_executable(chrome_path);

    config_builder = if options.headless {
        config_builder.headless_mode(HeadlessMode::default())
    } else {
        config_builder.with_head()
    };

    config_builder = config_builder
        .arg(format!("--user-agent={user_agent}"))
        .arg(format!("--window-size={width},{height}"))
        .arg("--lang=vi-VN")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-popup-blocking")
        .arg("--disable-extensions")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-gpu")
        .arg("--disable-setuid-sandbox")
        .arg("--no-sandbox")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--disable-breakpad")
        .arg("--disable-hang-monitor")
        .arg("--disable-features=TranslateUI")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio");

    let browser_config = config_builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .context("Failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                let error_msg = e.to_string();

                // chromiumoxide cannot decode some newer CDP events
                let is_benign_serialization_error = error_msg
                    .contains("data did not match any variant of untagged enum Message")
                    || error_msg.contains("Failed to deserialize WS response");

                if is_benign_serialization_error {
                    trace!("Suppressed benign CDP serialization error: {}", error_msg);
                } else {
                    error!("Browser handler error: {:?}", e);
                }
            }
        }
        trace!("Browser handler task completed");
    });

    Ok((browser, handler_task))
}
