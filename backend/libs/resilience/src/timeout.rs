/// Timeout wrapper for async operations
use std::future::Future;
use std::time::Duration;

use error_types::ServiceError;
use tokio::time::timeout;
use tracing::warn;

/// Convention for remote calls
pub const DEFAULT_REMOTE_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_REMOTE_CALL_TIMEOUT,
        }
    }
}

impl TimeoutConfig {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            duration: Duration::from_secs(secs),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("{op} timed out after {after:?}")]
    Elapsed { op: &'static str, after: Duration },
    #[error(transparent)]
    Failed(E),
}

/// A timeout is an internal failure; an inner error keeps its own kind.
impl<E: Into<ServiceError>> From<TimeoutError<E>> for ServiceError {
    fn from(err: TimeoutError<E>) -> Self {
        match err {
            TimeoutError::Elapsed { op, after } => {
                ServiceError::internal(format!("{} timed out after {:?}", op, after))
            }
            TimeoutError::Failed(inner) => inner.into(),
        }
    }
}

/// Execute a future with timeout
pub async fn with_timeout<F, T>(
    op: &'static str,
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError<std::convert::Infallible>>
where
    F: Future<Output = T>,
{
    timeout(duration, future).await.map_err(|_| {
        warn!(op, timeout_ms = duration.as_millis() as u64, "operation timed out");
        TimeoutError::Elapsed {
            op,
            after: duration,
        }
    })
}

/// Execute a fallible future with timeout, keeping the typed error
pub async fn with_timeout_result<F, T, E>(
    op: &'static str,
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutError::Failed(e)),
        Err(_) => {
            warn!(op, timeout_ms = duration.as_millis() as u64, "operation timed out");
            Err(TimeoutError::Elapsed {
                op,
                after: duration,
            })
        }
    }
}
