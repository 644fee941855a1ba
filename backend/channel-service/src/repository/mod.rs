mod postgres;

pub use postgres::PgChannelRepository;

use async_trait::async_trait;
use cursor_codec::PageRequest;
use error_types::ServiceResult;

use crate::models::{ChannelChanges, ChannelFilter, ChannelKey, ChannelRecord, NewChannel};

/// Storage for channel records
///
/// Lookups by [`ChannelKey`] and listings are unscoped: they include
/// soft-deleted channels. Writes only ever touch live channels.
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    /// Insert a channel. A duplicate title is an `InvalidArgument`.
    async fn create(&self, channel: &NewChannel) -> ServiceResult<ChannelRecord>;

    /// Apply `changes` to a live channel, returning `None` if there is none with `id`
    async fn update(
        &self,
        id: i64,
        changes: &ChannelChanges,
    ) -> ServiceResult<Option<ChannelRecord>>;

    /// Returns false when no live channel had this id
    async fn soft_delete(&self, id: i64) -> ServiceResult<bool>;

    async fn find(&self, key: &ChannelKey) -> ServiceResult<Option<ChannelRecord>>;

    async fn find_live(&self, id: i64) -> ServiceResult<Option<ChannelRecord>>;

    /// Rows with `id < page.before_id`, newest first, at most `page.limit`
    async fn list_page(
        &self,
        filter: &ChannelFilter,
        page: &PageRequest,
    ) -> ServiceResult<Vec<ChannelRecord>>;

    async fn count(&self, filter: &ChannelFilter) -> ServiceResult<i64>;

    /// Add `delta` to the counter of every live channel titled in `titles`,
    /// as a single atomic update. Returns `(title, new_count)` for each
    /// channel touched; titles with no live channel are absent.
    async fn adjust_subscribers(
        &self,
        titles: &[String],
        delta: i32,
    ) -> ServiceResult<Vec<(String, i32)>>;
}
