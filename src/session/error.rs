use std::time::Duration;
use thiserror::Error;

/// Failures of a single browser session
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("failed to prepare browser profile: {0}")]
    Profile(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("challenge page did not clear for {0}")]
    Challenge(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("element '{0}' did not appear")]
    ElementMissing(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser session crashed: {0}")]
    Crashed(String),

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// The session can no longer be used and must be discarded
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Crashed(_) | Self::Closed | Self::Launch(_))
    }

    /// Map a CDP error message to a session error.
    ///
    /// chromiumoxide reports a dead browser as a closed channel or websocket
    /// error; everything else is attributed to `operation` on `url`.
    pub fn from_cdp(url: &str, err: impl std::fmt::Display) -> Self {
        let reason = err.to_string();
        let lower = reason.to_lowercase();
        if lower.contains("channel closed")
            || lower.contains("receiver is gone")
            || lower.contains("send failed")
            || lower.contains("websocket")
            || lower.contains("connection closed")
            || lower.contains("target closed")
            || lower.contains("browser closed")
        {
            return Self::Crashed(reason);
        }
        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::Timeout {
                operation: "browser request",
                timeout: Duration::ZERO,
            };
        }
        Self::Navigation {
            url: url.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_channel_is_a_crash() {
        let err = SessionError::from_cdp("https://itviec.com", "ChannelSendError: channel closed");
        assert!(err.is_session_fatal());
    }

    #[test]
    fn other_cdp_errors_are_navigation_failures() {
        let err = SessionError::from_cdp("https://itviec.com", "net::ERR_NAME_NOT_RESOLVED");
        assert!(matches!(err, SessionError::Navigation { .. }));
        assert!(!err.is_session_fatal());
    }
}
