//! Deadline enforcement for remote calls.

use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// Await `fut`, failing with [`LlmError::Timeout`] once `limit` elapses.
///
/// The in-flight request is dropped on expiry; nothing is retried.
///
/// # Errors
///
/// Returns the future's own error, or `LlmError::Timeout`.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(operation, seconds = limit.as_secs(), "remote call timed out");
            Err(LlmError::Timeout {
                operation,
                seconds: limit.as_secs(),
            })
        }
    }
}
