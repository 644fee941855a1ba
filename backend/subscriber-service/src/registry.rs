use std::sync::Arc;
use std::time::Duration;

use account_client::{Account, AccountDirectory, AccountError};
use authz::{Authorizer, RequestContext};
use channel_names::normalize_channel_names;
use cursor_codec::{next_page_token, parse_page, CursorCodec, Page};
use error_types::{OpContext, ServiceError, ServiceResult};
use futures::future::join_all;
use resilience::timeout::DEFAULT_REMOTE_CALL_TIMEOUT;
use resilience::{with_timeout_result, TimeoutError};
use tracing::{debug, error, info, warn};

use crate::counter::ChannelCounterClient;
use crate::metrics::SubscriberMetrics;
use crate::models::{ListSubscribersRequest, Subscriber};
use crate::store::{SubscriptionStore, SubscriptionTx};

pub const MAX_SUBSCRIBER_PAGE_SIZE: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Join,
    Leave,
}

impl Membership {
    fn op(self) -> &'static str {
        match self {
            Membership::Join => "Subscribe",
            Membership::Leave => "Unsubscribe",
        }
    }

    fn metric_label(self) -> &'static str {
        match self {
            Membership::Join => "subscribe",
            Membership::Leave => "unsubscribe",
        }
    }

    fn counter_op(self) -> &'static str {
        match self {
            Membership::Join => "IncrementSubscribers",
            Membership::Leave => "DecrementSubscribers",
        }
    }

    fn inverse(self) -> Self {
        match self {
            Membership::Join => Membership::Leave,
            Membership::Leave => Membership::Join,
        }
    }
}

/// Channel memberships of subscribers, kept in step with the channel
/// service's subscriber counters.
///
/// A membership change runs as one attempt: validate, authorize, open a
/// local transaction, stage the row changes, make a single remote counter
/// call for the channels whose membership actually changed, then commit.
/// Any failure after the transaction opens rolls it back. If the commit
/// itself fails after the counters moved, the inverse counter call is
/// issued before the commit error is returned.
pub struct SubscriberRegistry {
    store: Arc<dyn SubscriptionStore>,
    counter: Arc<dyn ChannelCounterClient>,
    accounts: Arc<dyn AccountDirectory>,
    authorizer: Arc<dyn Authorizer>,
    codec: CursorCodec,
    remote_timeout: Duration,
    metrics: SubscriberMetrics,
}

impl SubscriberRegistry {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        counter: Arc<dyn ChannelCounterClient>,
        accounts: Arc<dyn AccountDirectory>,
        authorizer: Arc<dyn Authorizer>,
        codec: CursorCodec,
    ) -> Self {
        Self {
            store,
            counter,
            accounts,
            authorizer,
            codec,
            remote_timeout: DEFAULT_REMOTE_CALL_TIMEOUT,
            metrics: SubscriberMetrics::new(),
        }
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: SubscriberMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Join `channels`. Channels already joined are skipped.
    pub async fn subscribe(
        &self,
        ctx: &RequestContext,
        subscriber_id: &str,
        channels: &[String],
    ) -> ServiceResult<()> {
        self.change_membership(ctx, subscriber_id, channels, Membership::Join)
            .await
    }

    /// Leave `channels`. Channels never joined are skipped.
    pub async fn unsubscribe(
        &self,
        ctx: &RequestContext,
        subscriber_id: &str,
        channels: &[String],
    ) -> ServiceResult<()> {
        self.change_membership(ctx, subscriber_id, channels, Membership::Leave)
            .await
    }

    pub async fn get_subscriber(
        &self,
        ctx: &RequestContext,
        subscriber_id: &str,
    ) -> ServiceResult<Subscriber> {
        const OP: &str = "GetSubscriber";

        let subscriber_id = subscriber_id.trim();
        if subscriber_id.is_empty() {
            return Err(ServiceError::invalid_argument("subscriber_id is required").with_op(OP));
        }
        let caller = self
            .authorizer
            .authorize_actor_or_admin(ctx, subscriber_id)
            .await
            .op(OP)?;
        let privileged = self.authorizer.is_admin(&caller);

        let channels = self.store.active_channels(subscriber_id).await.op(OP)?;
        let account = self.lookup_account(subscriber_id, privileged).await.op(OP)?;

        Ok(Subscriber::from_account(account, channels, privileged))
    }

    /// Admin-only listing of subscribers, newest membership first.
    ///
    /// Subscribers whose account no longer exists are left out of the page;
    /// the page token still advances past them.
    pub async fn list_subscribers(
        &self,
        ctx: &RequestContext,
        request: ListSubscribersRequest,
    ) -> ServiceResult<Page<Subscriber>> {
        const OP: &str = "ListSubscribers";

        let caller = self.authorizer.authorize_admin(ctx).await.op(OP)?;
        let privileged = self.authorizer.is_admin(&caller);

        let page = parse_page(
            &self.codec,
            request.page_size,
            &request.page_token,
            MAX_SUBSCRIBER_PAGE_SIZE,
        )
        .op(OP)?;
        let filter = if request.channels.is_empty() {
            Vec::new()
        } else {
            normalize_channel_names(&request.channels).op(OP)?
        };

        let rows = self
            .store
            .list_subscriber_page(&filter, &page)
            .await
            .op(OP)?;
        let collection_count = if page.is_first_page() {
            self.store.count_subscribers(&filter).await.op(OP)?
        } else {
            0
        };

        let resolved = join_all(
            rows.iter()
                .map(|row| self.resolve_subscriber(&row.user_id, privileged)),
        )
        .await;

        let mut items = Vec::with_capacity(rows.len());
        for (row, subscriber) in rows.iter().zip(resolved) {
            match subscriber.op(OP)? {
                Some(subscriber) => items.push(subscriber),
                None => debug!(subscriber_id = %row.user_id, "account missing, subscriber skipped"),
            }
        }

        let next_page_token =
            next_page_token(&self.codec, rows.len(), page.limit, rows.last().map(|r| r.id))
                .map_err(|e| {
                    ServiceError::internal(format!("encoding page token: {}", e)).with_op(OP)
                })?;

        Ok(Page {
            items,
            next_page_token,
            collection_count,
        })
    }

    async fn change_membership(
        &self,
        ctx: &RequestContext,
        subscriber_id: &str,
        channels: &[String],
        membership: Membership,
    ) -> ServiceResult<()> {
        let op = membership.op();

        let subscriber_id = subscriber_id.trim();
        if subscriber_id.is_empty() {
            return Err(ServiceError::invalid_argument("subscriber_id is required").with_op(op));
        }
        let channels = normalize_channel_names(channels).op(op)?;
        self.authorizer
            .authorize_actor_or_admin(ctx, subscriber_id)
            .await
            .op(op)?;

        let result = self
            .apply_in_transaction(ctx, subscriber_id, &channels, membership)
            .await;

        let outcome = match &result {
            Ok(changed) if changed.is_empty() => "unchanged",
            Ok(_) => "committed",
            Err(_) => "failed",
        };
        self.metrics
            .record_membership_change(membership.metric_label(), outcome);

        result.map(|_| ()).op(op)
    }

    /// Returns the channels whose membership changed.
    async fn apply_in_transaction(
        &self,
        ctx: &RequestContext,
        subscriber_id: &str,
        channels: &[String],
        membership: Membership,
    ) -> ServiceResult<Vec<String>> {
        let mut tx = self.store.begin().await?;

        let staged = match membership {
            Membership::Join => tx.insert_missing(subscriber_id, channels).await,
            Membership::Leave => tx.soft_delete(subscriber_id, channels).await,
        };
        let changed = match staged {
            Ok(changed) => changed,
            Err(e) => {
                self.rollback(tx, subscriber_id, membership, &e).await;
                return Err(e);
            }
        };

        if changed.is_empty() {
            tx.commit().await?;
            debug!(subscriber_id, op = membership.op(), "membership already up to date");
            return Ok(changed);
        }

        if let Err(e) = self.sync_counters(ctx, &changed, membership).await {
            self.rollback(tx, subscriber_id, membership, &e).await;
            return Err(e);
        }

        if let Err(e) = tx.commit().await {
            error!(
                subscriber_id,
                op = membership.op(),
                channels = ?changed,
                error = %e,
                "commit failed after counters were updated"
            );
            self.compensate(ctx, subscriber_id, &changed, membership).await;
            return Err(e);
        }

        info!(
            subscriber_id,
            op = membership.op(),
            channels = ?changed,
            "membership change committed"
        );
        Ok(changed)
    }

    async fn sync_counters(
        &self,
        ctx: &RequestContext,
        channels: &[String],
        membership: Membership,
    ) -> ServiceResult<()> {
        let call = async {
            match membership {
                Membership::Join => self.counter.increment_subscribers(ctx, channels).await,
                Membership::Leave => self.counter.decrement_subscribers(ctx, channels).await,
            }
        };

        with_timeout_result(membership.counter_op(), self.remote_timeout, call)
            .await
            .map_err(ServiceError::from)
    }

    async fn rollback(
        &self,
        tx: Box<dyn SubscriptionTx>,
        subscriber_id: &str,
        membership: Membership,
        cause: &ServiceError,
    ) {
        match tx.rollback().await {
            Ok(()) => warn!(
                subscriber_id,
                op = membership.op(),
                error = %cause,
                "membership change rolled back"
            ),
            Err(e) => error!(
                subscriber_id,
                op = membership.op(),
                error = %e,
                cause = %cause,
                "rollback failed"
            ),
        }
    }

    async fn compensate(
        &self,
        ctx: &RequestContext,
        subscriber_id: &str,
        channels: &[String],
        membership: Membership,
    ) {
        let inverse = membership.inverse();
        match self.sync_counters(ctx, channels, inverse).await {
            Ok(()) => {
                warn!(
                    subscriber_id,
                    op = inverse.counter_op(),
                    channels = ?channels,
                    "counter change compensated"
                );
                self.metrics.record_compensation("succeeded");
            }
            Err(e) => {
                error!(
                    subscriber_id,
                    op = inverse.counter_op(),
                    channels = ?channels,
                    error = %e,
                    "counter compensation failed; counters have drifted"
                );
                self.metrics.record_compensation("failed");
            }
        }
    }

    async fn lookup_account(
        &self,
        account_id: &str,
        privileged: bool,
    ) -> Result<Account, TimeoutError<AccountError>> {
        with_timeout_result(
            "GetAccount",
            self.remote_timeout,
            self.accounts.get_account(account_id, privileged),
        )
        .await
    }

    /// `None` when the account no longer exists
    async fn resolve_subscriber(
        &self,
        subscriber_id: &str,
        privileged: bool,
    ) -> ServiceResult<Option<Subscriber>> {
        let channels = self.store.active_channels(subscriber_id).await?;

        match self.lookup_account(subscriber_id, privileged).await {
            Ok(account) => Ok(Some(Subscriber::from_account(account, channels, privileged))),
            Err(TimeoutError::Failed(e)) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
