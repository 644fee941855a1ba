mod postgres;

pub use postgres::{PgSubscriptionStore, PgSubscriptionTx};

use async_trait::async_trait;
use cursor_codec::PageRequest;
use error_types::ServiceResult;

use crate::models::SubscriberRow;

/// Membership storage
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn begin(&self) -> ServiceResult<Box<dyn SubscriptionTx>>;

    /// Distinct channels the subscriber is actively a member of
    async fn active_channels(&self, user_id: &str) -> ServiceResult<Vec<String>>;

    /// One row per subscriber with an active membership in any of `channels`
    /// (all channels when empty), keyed by the highest matching row id.
    /// Keys below `page.before_id`, highest first, at most `page.limit`.
    async fn list_subscriber_page(
        &self,
        channels: &[String],
        page: &PageRequest,
    ) -> ServiceResult<Vec<SubscriberRow>>;

    /// Number of distinct subscribers the listing would traverse
    async fn count_subscribers(&self, channels: &[String]) -> ServiceResult<i64>;
}

/// An open local transaction over membership rows.
///
/// Dropping it without calling `commit` discards every staged change.
#[async_trait]
pub trait SubscriptionTx: Send {
    /// Add active memberships that do not exist yet.
    /// Returns the channels actually inserted.
    async fn insert_missing(
        &mut self,
        user_id: &str,
        channels: &[String],
    ) -> ServiceResult<Vec<String>>;

    /// Soft delete active memberships. Returns the channels actually removed.
    async fn soft_delete(&mut self, user_id: &str, channels: &[String])
        -> ServiceResult<Vec<String>>;

    async fn commit(self: Box<Self>) -> ServiceResult<()>;

    async fn rollback(self: Box<Self>) -> ServiceResult<()>;
}
