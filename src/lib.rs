pub mod browser_pool;
pub mod browser_profile;
pub mod browser_setup;
pub mod config;
pub mod content_saver;
pub mod crawl_engine;
pub mod incremental;
pub mod job_runner;
pub mod kromekover;
pub mod notifier;
pub mod page_extractor;
pub mod session;
pub mod sites;
pub mod sync;
pub mod utils;

pub use browser_pool::{PoolStats, PooledSession, SessionPool};
pub use browser_profile::cleanup_stale_profiles;
pub use browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use config::{CrawlerConfig, RunConfig};
pub use content_saver::{load_latest_batch, save_batch};
pub use crawl_engine::{
    CrawlCounters, CrawlError, CrawlResult, DetailOptions, ListingOptions, RetryPolicy,
    collect_candidates, fetch_details,
};
pub use incremental::{diff, load_previous_urls, merge};
pub use job_runner::{CrawlerReport, JobRunner, JobStats, RunReport, summarize};
pub use notifier::{NoopNotifier, Notifier, TelegramNotifier};
pub use page_extractor::schema::*;
pub use session::{
    BrowserSession, ChromeSession, ChromeSessionFactory, SessionError, SessionFactory,
    SessionOptions, create_session,
};
pub use sites::SiteProfile;
pub use sync::{JobApiClient, SyncReport, SyncStrategy, sync_batch};
