//! Client for the job storage REST API.

use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::crawl_engine::retry_policy::RetryPolicy;
use crate::page_extractor::schema::JobRecord;
use crate::utils::DEFAULT_HTTP_TIMEOUT;

const CSRF_HEADER: &str = "x-csrftoken";
const CLIENT_USER_AGENT: &str = concat!("jobhub-crawler/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned HTTP {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("invalid credentials header: {0}")]
    InvalidHeader(String),
}

/// Connection settings for the storage API
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Collection URL, e.g. `http://127.0.0.1:8000/api/jobs/`
    pub base_url: String,
    pub csrf_token: String,
    pub session_id: String,
    pub timeout: Duration,
    /// Retry schedule for 429 and 5xx responses and connection failures
    pub retry: RetryPolicy,
}

impl ApiConfig {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        csrf_token: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: csrf_token.into(),
            session_id: session_id.into(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            retry: RetryPolicy::linear(3, Duration::from_millis(300)),
        }
    }
}

/// A job as the storage API returns it; only what syncing needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteJob {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobListing {
    Plain(Vec<RemoteJob>),
    Paginated { results: Vec<RemoteJob> },
}

#[derive(Debug, Clone)]
pub struct JobApiClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

fn header_value(value: &str) -> Result<HeaderValue, SyncError> {
    HeaderValue::from_str(value).map_err(|e| SyncError::InvalidHeader(e.to_string()))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl JobApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(CSRF_HEADER), header_value(&config.csrf_token)?);
        headers.insert(
            COOKIE,
            header_value(&format!(
                "csrftoken={}; sessionid={}",
                config.csrf_token, config.session_id
            ))?,
        );

        let http = reqwest::Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            http,
            base_url,
            retry: config.retry,
        })
    }

    /// Send with retries on throttling, server errors and connection failures
    async fn send(
        &self,
        method: &'static str,
        url: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<reqwest::Response, SyncError> {
        let attempts = self.retry.attempts();
        let mut attempt = 1;
        loop {
            let retryable = match build().send().await {
                Ok(response) if !is_retryable(response.status()) => return Ok(response),
                Ok(response) => SyncError::Status {
                    method,
                    url: url.to_string(),
                    status: response.status().as_u16(),
                },
                Err(e) if e.is_connect() || e.is_timeout() => SyncError::Http(e),
                Err(e) => return Err(SyncError::Http(e)),
            };
            if !self.retry.should_retry(attempt) {
                return Err(retryable);
            }
            debug!("{method} {url} attempt {attempt}/{attempts} failed: {retryable}");
            tokio::time::sleep(self.retry.delay_for(attempt)).await;
            attempt += 1;
        }
    }

    fn expect_success(
        method: &'static str,
        url: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, SyncError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(SyncError::Status {
                method,
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }

    /// Every job currently stored
    pub async fn list_jobs(&self) -> Result<Vec<RemoteJob>, SyncError> {
        let url = self.base_url.clone();
        let response = self.send("GET", &url, || self.http.get(&url)).await?;
        let listing: JobListing = Self::expect_success("GET", &url, response)?.json().await?;
        Ok(match listing {
            JobListing::Plain(jobs) | JobListing::Paginated { results: jobs } => jobs,
        })
    }

    pub async fn create_job(&self, job: &JobRecord) -> Result<(), SyncError> {
        let url = self.base_url.clone();
        let response = self.send("POST", &url, || self.http.post(&url).json(job)).await?;
        Self::expect_success("POST", &url, response)?;
        Ok(())
    }

    pub async fn delete_job(&self, id: i64) -> Result<(), SyncError> {
        let url = format!("{}{id}/", self.base_url);
        let response = self.send("DELETE", &url, || self.http.delete(&url)).await?;
        Self::expect_success("DELETE", &url, response)?;
        Ok(())
    }
}
