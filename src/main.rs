//! jobhub-crawler entry point
//!
//! One invocation is one run: crawl the configured sites, save the batch,
//! report, and optionally push the batch to the storage API.

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use jobhub_crawler::browser_profile::cleanup_stale_profiles;
use jobhub_crawler::config::{CrawlerConfig, RunConfig};
use jobhub_crawler::content_saver::load_batch;
use jobhub_crawler::notifier::{NoopNotifier, Notifier, TelegramNotifier, run_status_message};
use jobhub_crawler::session::{ChromeSessionFactory, registry};
use jobhub_crawler::sync::{ApiConfig, JobApiClient, SyncStrategy, sync_batch};
use jobhub_crawler::utils::PROFILE_DIR_PREFIX;
use jobhub_crawler::{JobRunner, sites, summarize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncMode {
    /// Delete every stored job, then upload the saved batch
    Full,
    /// Upload only jobs whose URL is not stored yet
    Incremental,
}

impl From<SyncMode> for SyncStrategy {
    fn from(mode: SyncMode) -> Self {
        match mode {
            SyncMode::Full => SyncStrategy::FullReplace,
            SyncMode::Incremental => SyncStrategy::Incremental,
        }
    }
}

/// Incremental crawler for Vietnamese IT job boards
#[derive(Parser, Debug)]
#[command(name = "jobhub-crawler")]
#[command(version)]
#[command(about = "Crawl IT job listings and keep an incremental JSON corpus", long_about = None)]
struct Cli {
    /// Directory holding persisted batches
    #[arg(long, env = "JOBHUB_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Site to crawl; repeat for several (default: every built-in site)
    #[arg(long = "site", value_name = "NAME")]
    sites: Vec<String>,

    /// Browser sessions per site
    #[arg(long, default_value_t = jobhub_crawler::utils::DEFAULT_MAX_CONCURRENCY)]
    workers: usize,

    /// Detail-phase concurrency per site (default and upper bound: --workers)
    #[arg(long)]
    detail_workers: Option<usize>,

    /// Detail attempts per job before the retry sweep
    #[arg(long, default_value_t = jobhub_crawler::utils::DEFAULT_DETAIL_ATTEMPTS)]
    max_attempts: u32,

    /// Upper bound on listing pages per site
    #[arg(long, default_value_t = jobhub_crawler::utils::DEFAULT_MAX_PAGES)]
    max_pages: u32,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Skip the anti-detection scripts
    #[arg(long)]
    no_stealth: bool,

    /// Save only this run's records instead of the consolidated corpus
    #[arg(long)]
    no_merge: bool,

    /// Push the saved batch to the storage API
    #[arg(long, value_enum)]
    sync: Option<SyncMode>,

    /// Storage API collection URL
    #[arg(long, env = "JOBHUB_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "JOBHUB_CSRF_TOKEN", hide_env_values = true)]
    csrf_token: Option<String>,

    #[arg(long, env = "JOBHUB_SESSION_ID", hide_env_values = true)]
    session_id: Option<String>,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    telegram_chat_id: Option<String>,

    /// Also send the saved batch file to Telegram
    #[arg(long)]
    send_file: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let _registry = registry::install();
    sweep_orphaned_profiles("startup");

    let config = build_config(&cli)?;
    let api = api_config(&cli)?;

    let result = match (&cli.telegram_token, &cli.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            let notifier = TelegramNotifier::new(token, chat_id)?;
            run(&cli, config, api, notifier).await
        }
        _ => run(&cli, config, api, NoopNotifier).await,
    };

    sweep_orphaned_profiles("shutdown");
    result
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("jobhub_crawler=info,warn")),
            1 => EnvFilter::new("jobhub_crawler=debug,info"),
            2 => EnvFilter::new("jobhub_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn sweep_orphaned_profiles(phase: &str) {
    match cleanup_stale_profiles(PROFILE_DIR_PREFIX) {
        Ok(0) => {}
        Ok(removed) => tracing::info!("Removed {removed} orphaned browser profiles at {phase}"),
        Err(e) => tracing::warn!("Orphaned profile sweep failed at {phase}: {e:#}"),
    }
}

fn build_config(cli: &Cli) -> Result<RunConfig> {
    let site_names: Vec<String> = if cli.sites.is_empty() {
        sites::all().iter().map(|s| s.name.to_string()).collect()
    } else {
        cli.sites.clone()
    };

    let crawlers = site_names.into_iter().map(|name| {
        let crawler = CrawlerConfig::new(name)
            .max_concurrency(cli.workers)
            .max_attempts(cli.max_attempts);
        match cli.detail_workers {
            Some(n) => crawler.detail_concurrency(n),
            None => crawler,
        }
    });

    RunConfig::builder()
        .output_dir(&cli.output_dir)
        .crawlers(crawlers)
        .consolidate(!cli.no_merge)
        .headless(!cli.headful)
        .anti_detection(!cli.no_stealth)
        .max_pages(cli.max_pages)
        .build()
        .context("invalid configuration")
}

/// Storage API settings, required only when syncing
fn api_config(cli: &Cli) -> Result<Option<ApiConfig>> {
    if cli.sync.is_none() {
        return Ok(None);
    }
    match (&cli.api_url, &cli.csrf_token, &cli.session_id) {
        (Some(url), Some(csrf), Some(session)) => Ok(Some(ApiConfig::new(url, csrf, session))),
        _ => bail!("--sync needs JOBHUB_API_URL, JOBHUB_CSRF_TOKEN and JOBHUB_SESSION_ID"),
    }
}

async fn run<N: Notifier>(
    cli: &Cli,
    config: RunConfig,
    api: Option<ApiConfig>,
    notifier: N,
) -> Result<()> {
    let site_list: Vec<&str> = config.crawlers().iter().map(|c| c.site.as_str()).collect();
    notifier
        .send_status(&format!("Starting crawl: {}", site_list.join(", ")))
        .await;

    let factory = ChromeSessionFactory::new(config.session_options());
    let runner = JobRunner::new(config, factory)?;
    let report = runner.run_configured().await;
    let stats = summarize(&report.batch.jobs, runner.config().top_tags());
    tracing::info!("Run summary:\n{stats}");

    let saved = runner.persist(&report, runner.config().consolidate()).await;
    let saved_path = match &saved {
        Ok(path) => Some(path.as_path()),
        Err(e) => {
            tracing::error!("Failed to save batch: {e:#}");
            None
        }
    };

    notifier
        .send_status(&run_status_message(&report, &stats, saved_path))
        .await;
    if cli.send_file
        && let Some(path) = saved_path
    {
        notifier.send_file(path).await;
    }

    let path = saved?;
    if let (Some(mode), Some(api)) = (cli.sync, api) {
        push_to_storage(&path, &api, mode.into(), &notifier).await?;
    }
    Ok(())
}

async fn push_to_storage<N: Notifier>(
    path: &Path,
    api: &ApiConfig,
    strategy: SyncStrategy,
    notifier: &N,
) -> Result<()> {
    let batch = load_batch(path).await?;
    let client = JobApiClient::new(api)?;
    let report = sync_batch(&client, &batch, strategy)
        .await
        .context("sync to storage API failed")?;

    notifier
        .send_status(&format!(
            "Sync finished: {} deleted, {} uploaded, {} skipped, {} failed",
            report.deleted, report.uploaded, report.skipped, report.failed
        ))
        .await;
    Ok(())
}
