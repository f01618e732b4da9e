//! Timeout utilities for page operations
//!
//! Every browser call made by a session goes through [`with_page_timeout`],
//! so no navigation or DOM query can hang a worker indefinitely.

use std::future::Future;
use std::time::Duration;

use super::SessionError;

/// Run `operation` with a deadline, mapping expiry to [`SessionError::Timeout`].
pub async fn with_page_timeout<F, T>(
    operation: F,
    timeout: Duration,
    operation_name: &'static str,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::Timeout {
            operation: operation_name,
            timeout,
        }),
    }
}
