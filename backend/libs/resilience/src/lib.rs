/// Resilience helpers for calls that leave the process
///
/// Every remote call made by a service operation is bounded by a
/// request-scoped timeout. Retries are deliberately absent: retry policy
/// belongs to the transport layer in front of the service.
///
/// # Example
///
/// ```rust,no_run
/// use resilience::{with_timeout_result, TimeoutConfig};
///
/// # async fn example() {
/// let config = TimeoutConfig::default();
///
/// let result = with_timeout_result("IncrementSubscribers", config.duration, async {
///     // remote counter call
///     Ok::<_, String>(())
/// })
/// .await;
/// # }
/// ```
pub mod timeout;

pub use timeout::{with_timeout, with_timeout_result, TimeoutConfig, TimeoutError};
