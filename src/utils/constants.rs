//! Shared configuration constants for jobhub_crawler
//!
//! Default values used throughout the crawler so the same numbers are not
//! repeated in the session manager, the orchestrators and the CLI.

use std::time::Duration;

/// Prefix for per-session Chrome profile directories in the temp dir
///
/// The orphan sweep only touches directories carrying this prefix.
pub const PROFILE_DIR_PREFIX: &str = "jobhub_chrome";

/// Marker text shown by Cloudflare-style interstitials
///
/// Matched case-insensitively against the page source.
pub const CHALLENGE_MARKERS: &[&str] = &["checking your browser", "just a moment"];

/// Default navigation attempts when challenge bypass is enabled
pub const DEFAULT_NAVIGATION_ATTEMPTS: u32 = 3;

/// Default detail-fetch attempts per candidate in the first pass
pub const DEFAULT_DETAIL_ATTEMPTS: u32 = 3;

/// Default attempts per candidate during the retry sweep
pub const DEFAULT_SWEEP_ATTEMPTS: u32 = 1;

/// Default pool capacity per crawler
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default wait after a page load before the content is inspected
///
/// A random jitter of up to the same amount is added by the navigator.
pub const DEFAULT_SETTLE_WAIT: Duration = Duration::from_secs(3);

/// Default extra wait when a challenge marker is present
pub const DEFAULT_CHALLENGE_WAIT: Duration = Duration::from_secs(10);

/// Base delay for navigation backoff (multiplied by the attempt number)
pub const DEFAULT_NAVIGATION_BACKOFF: Duration = Duration::from_secs(5);

/// Base delay for detail-fetch retries (multiplied by the attempt number)
pub const DEFAULT_DETAIL_BACKOFF: Duration = Duration::from_secs(2);

/// Timeout for a single `goto`
pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for waiting on a content selector
pub const DEFAULT_SELECTOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Allowance per detail attempt for launching a session and reading the page
///
/// Added on top of the navigation and selector timeouts when the detail phase
/// derives its task deadlines.
pub const DETAIL_SESSION_SLACK: Duration = Duration::from_secs(30);

/// Join timeout for one listing chunk worker
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(900);

/// Timeout for HTTP detail fetches and storage API calls
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on listing pages read from pagination
///
/// Protects against a mis-parsed page count.
pub const DEFAULT_MAX_PAGES: u32 = 200;

/// Pause between scroll rounds on infinite-scroll listings
pub const DEFAULT_SCROLL_DELAY: Duration = Duration::from_secs(2);

/// Scroll rounds before an infinite-scroll listing is considered complete
pub const DEFAULT_MAX_SCROLL_ROUNDS: u32 = 50;

/// Number of records per upload batch when syncing to the storage API
pub const SYNC_BATCH_SIZE: usize = 10;

/// Concurrent uploads when syncing to the storage API
pub const SYNC_UPLOAD_CONCURRENCY: usize = 3;

/// Concurrent deletes when clearing the storage API
pub const SYNC_DELETE_CONCURRENCY: usize = 5;

/// Pause between upload batches
pub const SYNC_BATCH_PAUSE: Duration = Duration::from_millis(500);

/// Desktop user agents the session manager picks from
///
/// Kept to recent stable Chrome releases on the three desktop platforms.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.205 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.205 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36",
];

/// User agent for plain HTTP requests (detail fetch, storage API)
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
