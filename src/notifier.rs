//! Run status notifications
//!
//! Notifications are fire-and-forget: a failed delivery is logged and the
//! run carries on.

use std::future::Future;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::job_runner::{JobStats, RunReport};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram rejected {method}: HTTP {status}: {body}")]
    Rejected {
        method: &'static str,
        status: u16,
        body: String,
    },

    #[error("cannot read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for human-readable run status
pub trait Notifier: Send + Sync {
    fn send_status(&self, text: &str) -> impl Future<Output = ()> + Send;

    fn send_file(&self, path: &Path) -> impl Future<Output = ()> + Send;
}

/// Drops every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn send_status(&self, text: &str) {
        debug!("Notification suppressed: {text}");
    }

    async fn send_file(&self, path: &Path) {
        debug!("File notification suppressed: {}", path.display());
    }
}

/// Telegram Bot API notifier
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_base: TELEGRAM_API_BASE.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        })
    }

    /// Point at another Bot API host, such as a relay
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn check(method: &'static str, response: reqwest::Response) -> Result<(), NotifyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            method,
            status: status.as_u16(),
            body,
        })
    }

    pub async fn try_send_status(&self, text: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await?;
        Self::check("sendMessage", response).await
    }

    pub async fn try_send_file(&self, path: &Path) -> Result<(), NotifyError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| NotifyError::File {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "jobs.json".to_string());

        let document = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/json")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("document", document);

        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        Self::check("sendDocument", response).await
    }
}

impl Notifier for TelegramNotifier {
    async fn send_status(&self, text: &str) {
        if let Err(e) = self.try_send_status(text).await {
            warn!("Telegram status not delivered: {e}");
        }
    }

    async fn send_file(&self, path: &Path) {
        if let Err(e) = self.try_send_file(path).await {
            warn!("Telegram file {} not delivered: {e}", path.display());
        }
    }
}

/// Markdown status message for a finished run
#[must_use]
pub fn run_status_message(report: &RunReport, stats: &JobStats, saved_to: Option<&Path>) -> String {
    let mut text = String::from("*Crawl finished*\n\n");
    text.push_str(&format!(
        "Time: `{}`\n",
        report.batch.metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(path) = saved_to {
        text.push_str(&format!("File: `{}`\n", path.display()));
    }
    text.push_str(&format!("New records: *{}*\n", report.batch.jobs.len()));
    text.push_str(&format!(
        "Run time: {:.1}s\nErrors: {}\n",
        report.batch.metadata.execution_time, report.errors
    ));

    for crawler in &report.per_crawler {
        match &crawler.error {
            Some(e) => text.push_str(&format!("- {}: failed ({e})\n", crawler.site)),
            None => text.push_str(&format!(
                "- {}: {} found, {} new, {} saved, {} dropped\n",
                crawler.site, crawler.candidates, crawler.new_candidates, crawler.records, crawler.dropped
            )),
        }
    }

    if !stats.top_tags.is_empty() {
        let tags: Vec<&str> = stats.top_tags.iter().map(|(tag, _)| tag.as_str()).collect();
        text.push_str(&format!("\nTop tags: {}", tags.join(", ")));
    }
    text
}
