use std::sync::Arc;

use authz::{AuthPayload, Authorizer, RequestContext};
use channel_names::normalize_channel_names;
use cursor_codec::{next_page_token, parse_page, CursorCodec, Page};
use error_types::{OpContext, ServiceError, ServiceResult};
use tracing::{debug, info, warn};

use crate::models::{ChannelChanges, ChannelFilter, ChannelKey, ChannelRecord, NewChannel};
use crate::repository::ChannelRepository;

pub const MAX_CHANNEL_PAGE_SIZE: i32 = 20;

#[derive(Debug, Clone, Default)]
pub struct ListChannelsRequest {
    pub page_size: i32,
    pub page_token: String,
    pub owner_id: Option<String>,
}

/// Channel CRUD and subscriber counters
#[derive(Clone)]
pub struct ChannelService {
    repo: Arc<dyn ChannelRepository>,
    authorizer: Arc<dyn Authorizer>,
    codec: CursorCodec,
}

impl ChannelService {
    pub fn new(
        repo: Arc<dyn ChannelRepository>,
        authorizer: Arc<dyn Authorizer>,
        codec: CursorCodec,
    ) -> Self {
        Self {
            repo,
            authorizer,
            codec,
        }
    }

    pub async fn create_channel(
        &self,
        ctx: &RequestContext,
        channel: NewChannel,
    ) -> ServiceResult<ChannelRecord> {
        const OP: &str = "CreateChannel";

        let channel = channel.normalized();
        if channel.title.is_empty() {
            return Err(ServiceError::invalid_argument("title is required").with_op(OP));
        }
        if channel.owner_id.is_empty() {
            return Err(ServiceError::invalid_argument("owner_id is required").with_op(OP));
        }

        self.authorizer
            .authorize_actor_or_admin(ctx, &channel.owner_id)
            .await
            .op(OP)?;

        let created = self.repo.create(&channel).await.op(OP)?;
        info!(channel_id = created.id, title = %created.title, "channel created");
        Ok(created)
    }

    /// Update a live channel from a submitted record.
    ///
    /// Only non-empty title, label, description and owner fields are applied.
    /// The submitted `id` selects the channel; `subscribers` is ignored.
    pub async fn update_channel(
        &self,
        ctx: &RequestContext,
        submitted: ChannelRecord,
    ) -> ServiceResult<ChannelRecord> {
        const OP: &str = "UpdateChannel";

        if submitted.id <= 0 {
            return Err(ServiceError::invalid_argument("channel id is required").with_op(OP));
        }
        let caller = self.authorizer.authenticate_request(ctx).await.op(OP)?;

        let existing = self.live_channel(submitted.id).await.op(OP)?;
        self.ensure_owner_or_admin(&caller, &existing).op(OP)?;

        let changes = ChannelChanges::from_submitted(&submitted);
        if changes.is_empty() {
            return Ok(existing);
        }

        let updated = self
            .repo
            .update(existing.id, &changes)
            .await
            .op(OP)?
            .ok_or_else(|| not_found(existing.id).with_op(OP))?;

        info!(channel_id = updated.id, caller = %caller.subject_id, "channel updated");
        Ok(updated)
    }

    pub async fn delete_channel(&self, ctx: &RequestContext, id: i64) -> ServiceResult<()> {
        const OP: &str = "DeleteChannel";

        if id <= 0 {
            return Err(ServiceError::invalid_argument("channel id is required").with_op(OP));
        }
        let caller = self.authorizer.authenticate_request(ctx).await.op(OP)?;

        let existing = self.live_channel(id).await.op(OP)?;
        self.ensure_owner_or_admin(&caller, &existing).op(OP)?;

        if !self.repo.soft_delete(id).await.op(OP)? {
            return Err(not_found(id).with_op(OP));
        }

        info!(channel_id = id, caller = %caller.subject_id, "channel deleted");
        Ok(())
    }

    /// Resolves deleted channels too.
    pub async fn get_channel(
        &self,
        ctx: &RequestContext,
        key: ChannelKey,
    ) -> ServiceResult<ChannelRecord> {
        const OP: &str = "GetChannel";

        let key = match key {
            ChannelKey::Id(id) if id <= 0 => {
                return Err(ServiceError::invalid_argument("channel id is required").with_op(OP))
            }
            ChannelKey::Title(title) if title.trim().is_empty() => {
                return Err(ServiceError::invalid_argument("channel title is required").with_op(OP))
            }
            ChannelKey::Title(title) => ChannelKey::Title(title.trim().to_string()),
            key => key,
        };
        self.authorizer.authenticate_request(ctx).await.op(OP)?;

        self.repo
            .find(&key)
            .await
            .op(OP)?
            .ok_or_else(|| ServiceError::not_found(format!("channel {:?}", key)).with_op(OP))
    }

    /// Page through all channels, deleted ones included, newest first.
    pub async fn list_channels(
        &self,
        ctx: &RequestContext,
        request: ListChannelsRequest,
    ) -> ServiceResult<Page<ChannelRecord>> {
        const OP: &str = "ListChannels";

        let page = parse_page(
            &self.codec,
            request.page_size,
            &request.page_token,
            MAX_CHANNEL_PAGE_SIZE,
        )
        .op(OP)?;
        self.authorizer.authenticate_request(ctx).await.op(OP)?;

        let filter = ChannelFilter {
            owner_id: request
                .owner_id
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty()),
        };

        let items = self.repo.list_page(&filter, &page).await.op(OP)?;
        let collection_count = if page.is_first_page() {
            self.repo.count(&filter).await.op(OP)?
        } else {
            0
        };

        let next_page_token =
            next_page_token(&self.codec, items.len(), page.limit, items.last().map(|c| c.id))
                .map_err(|e| {
                    ServiceError::internal(format!("encoding page token: {}", e)).with_op(OP)
                })?;

        debug!(
            returned = items.len(),
            first_page = page.is_first_page(),
            "listed channels"
        );
        Ok(Page {
            items,
            next_page_token,
            collection_count,
        })
    }

    pub async fn increment_subscribers(
        &self,
        ctx: &RequestContext,
        channel_names: &[String],
    ) -> ServiceResult<()> {
        self.adjust_subscribers(ctx, channel_names, 1, "IncrementSubscribers")
            .await
    }

    /// No floor: a counter may go negative.
    pub async fn decrement_subscribers(
        &self,
        ctx: &RequestContext,
        channel_names: &[String],
    ) -> ServiceResult<()> {
        self.adjust_subscribers(ctx, channel_names, -1, "DecrementSubscribers")
            .await
    }

    async fn adjust_subscribers(
        &self,
        ctx: &RequestContext,
        channel_names: &[String],
        delta: i32,
        op: &'static str,
    ) -> ServiceResult<()> {
        let names = normalize_channel_names(channel_names).op(op)?;
        let caller = self.authorizer.authenticate_request(ctx).await.op(op)?;

        let updated = self.repo.adjust_subscribers(&names, delta).await.op(op)?;

        for name in &names {
            match updated.iter().find(|(title, _)| title == name) {
                None => warn!(op, channel = %name, "no live channel with this title"),
                Some((_, count)) if *count < 0 => warn!(
                    op,
                    channel = %name,
                    subscribers = *count,
                    "subscriber count is negative"
                ),
                Some(_) => {}
            }
        }

        debug!(
            op,
            caller = %caller.subject_id,
            channels = ?names,
            touched = updated.len(),
            "subscriber counters adjusted"
        );
        Ok(())
    }

    async fn live_channel(&self, id: i64) -> ServiceResult<ChannelRecord> {
        self.repo.find_live(id).await?.ok_or_else(|| not_found(id))
    }

    fn ensure_owner_or_admin(
        &self,
        caller: &AuthPayload,
        channel: &ChannelRecord,
    ) -> ServiceResult<()> {
        if caller.subject_id == channel.owner_id || self.authorizer.is_admin(caller) {
            Ok(())
        } else {
            Err(ServiceError::permission_denied(format!(
                "caller {} does not own channel {}",
                caller.subject_id, channel.id
            )))
        }
    }
}

fn not_found(id: i64) -> ServiceError {
    ServiceError::not_found(format!("channel {}", id))
}
