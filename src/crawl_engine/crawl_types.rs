//! Error types and failure classification for the crawl phases.

use anyhow::Result;
use std::fmt;

use crate::page_extractor::extractors::ExtractError;
use crate::session::SessionError;

/// Custom error type for crawl operations
#[derive(Debug, Clone)]
pub enum CrawlError {
    /// Invalid crawler configuration
    ConfigError(String),
    /// The site's entry page could not be reached
    SiteUnreachable(String),
    /// Browser session failure
    Session(SessionError),
    /// HTTP fetch failure outside the browser
    Http(String),
    /// Page fetched but not understood
    ParseError(String),
    /// A fetch attempt exceeded its deadline
    Timeout(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::SiteUnreachable(msg) => write!(f, "Site unreachable: {msg}"),
            Self::Session(err) => write!(f, "Browser error: {err}"),
            Self::Http(msg) => write!(f, "HTTP error: {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::Timeout(msg) => write!(f, "Timeout: {msg}"),
            Self::Other(msg) => write!(f, "Crawl error: {msg}"),
        }
    }
}

impl std::error::Error for CrawlError {}

impl CrawlError {
    /// Whether the session that produced this error must not be reused
    ///
    /// A timed-out attempt leaves the page in an unknown state.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::Session(err) => err.is_session_fatal(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::Other(format!("{err:#}"))
    }
}

impl From<SessionError> for CrawlError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<ExtractError> for CrawlError {
    fn from(err: ExtractError) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for CrawlError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Convenience alias for Result with `CrawlError`
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Categorizes page failures for retry pacing and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, DNS, connection refused
    Network,
    /// Crash, closed target, CDP error
    Browser,
    /// Missing elements or unexpected layout
    ContentExtraction,
    /// HTTP 429 or an unresolved challenge page
    RateLimited,
    /// Unknown/unclassified error
    Unknown,
}

impl FailureKind {
    /// Largest value [`delay_multiplier`](Self::delay_multiplier) returns
    pub const MAX_DELAY_MULTIPLIER: f64 = 3.0;

    /// Classify an error into a failure kind based on error message patterns
    #[must_use]
    pub fn classify_message(message: &str) -> Self {
        let msg = message.to_lowercase();

        if msg.contains("429")
            || msg.contains("too many requests")
            || msg.contains("rate limit")
            || msg.contains("challenge")
        {
            return Self::RateLimited;
        }

        if msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("connection refused")
            || msg.contains("connection reset")
            || msg.contains("dns")
            || msg.contains("network")
            || msg.contains("unreachable")
            || msg.contains("eof")
        {
            return Self::Network;
        }

        if msg.contains("browser")
            || msg.contains("chrome")
            || msg.contains("cdp")
            || msg.contains("target")
            || msg.contains("session")
        {
            return Self::Browser;
        }

        if msg.contains("extract")
            || msg.contains("parse")
            || msg.contains("selector")
            || msg.contains("element")
            || msg.contains("layout")
        {
            return Self::ContentExtraction;
        }

        Self::Unknown
    }

    #[must_use]
    pub fn classify(error: &CrawlError) -> Self {
        match error {
            CrawlError::ParseError(_) => Self::ContentExtraction,
            CrawlError::Timeout(_) => Self::Network,
            CrawlError::Session(err) if err.is_session_fatal() => Self::Browser,
            other => Self::classify_message(&other.to_string()),
        }
    }

    /// Base delay multiplier for this failure kind
    #[must_use]
    pub const fn delay_multiplier(&self) -> f64 {
        match self {
            Self::Network | Self::ContentExtraction | Self::Unknown => 1.0,
            Self::Browser => 1.5,
            Self::RateLimited => Self::MAX_DELAY_MULTIPLIER,
        }
    }
}
