#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use account_client::{Account, AccountDirectory, AccountError};
use async_trait::async_trait;
use authz::testing::StaticAuthorizer;
use authz::RequestContext;
use channel_service::testing::InMemoryChannelRepository;
use channel_service::{ChannelService, NewChannel};
use cursor_codec::{CursorCodec, PageRequest};
use error_types::{ServiceError, ServiceResult};
use mockall::mock;
use subscriber_service::{
    ChannelCounterClient, SubscriberMetrics, SubscriberRegistry, SubscriberRow,
    SubscriptionStore, SubscriptionTx,
};

// ============================================
// Identities
// ============================================

pub fn authorizer() -> StaticAuthorizer {
    StaticAuthorizer::new()
        .with_identity("alice-token", "alice", &[])
        .with_identity("bob-token", "bob", &[])
        .with_identity("admin-token", "root", &["admin"])
}

pub fn as_alice() -> RequestContext {
    RequestContext::with_bearer("alice-token")
}

pub fn as_bob() -> RequestContext {
    RequestContext::with_bearer("bob-token")
}

pub fn as_admin() -> RequestContext {
    RequestContext::with_bearer("admin-token")
}

pub fn names(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

pub fn codec() -> CursorCodec {
    CursorCodec::new("subscriber-tests", 10)
}

// ============================================
// Accounts
// ============================================

mock! {
    pub Accounts {}

    #[async_trait]
    impl AccountDirectory for Accounts {
        async fn get_account(&self, account_id: &str, privileged: bool) -> Result<Account, AccountError>;
    }
}

pub fn account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        name: format!("User {}", id),
        email: Some(format!("{}@example.com", id)),
        phone: Some("+15550100".to_string()),
    }
}

/// Every account exists
pub fn known_accounts() -> MockAccounts {
    let mut accounts = MockAccounts::new();
    accounts
        .expect_get_account()
        .returning(|id, _| Ok(account(id)));
    accounts
}

// ============================================
// In-memory membership store
// ============================================

#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub id: i64,
    pub user_id: String,
    pub channel: String,
    pub deleted: bool,
}

#[derive(Default)]
struct StoreState {
    last_id: i64,
    rows: Vec<MembershipRow>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
}

impl StoreState {
    fn is_active(&self, user_id: &str, channel: &str) -> bool {
        self.rows
            .iter()
            .any(|r| !r.deleted && r.user_id == user_id && r.channel == channel)
    }

    fn insert(&mut self, user_id: &str, channel: &str) -> i64 {
        self.last_id += 1;
        self.rows.push(MembershipRow {
            id: self.last_id,
            user_id: user_id.to_string(),
            channel: channel.to_string(),
            deleted: false,
        });
        self.last_id
    }

    fn matching<'a>(&'a self, channels: &'a [String]) -> impl Iterator<Item = &'a MembershipRow> {
        self.rows
            .iter()
            .filter(move |r| !r.deleted && (channels.is_empty() || channels.contains(&r.channel)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_commit: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commit(&self, on: bool) {
        self.fail_commit.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Insert an active membership directly, outside any transaction
    pub fn seed(&self, user_id: &str, channel: &str) -> i64 {
        self.state.lock().unwrap().insert(user_id, channel)
    }

    /// Active (user, channel) pairs in insertion order
    pub fn active_rows(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|r| !r.deleted)
            .map(|r| (r.user_id.clone(), r.channel.clone()))
            .collect()
    }

    pub fn begins(&self) -> usize {
        self.state.lock().unwrap().begins
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn begin(&self) -> ServiceResult<Box<dyn SubscriptionTx>> {
        self.state.lock().unwrap().begins += 1;
        Ok(Box::new(InMemoryTx {
            store: self.clone(),
            staged: Vec::new(),
        }))
    }

    async fn active_channels(&self, user_id: &str) -> ServiceResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut channels: Vec<String> = state
            .rows
            .iter()
            .filter(|r| !r.deleted && r.user_id == user_id)
            .map(|r| r.channel.clone())
            .collect();
        channels.sort();
        channels.dedup();
        Ok(channels)
    }

    async fn list_subscriber_page(
        &self,
        channels: &[String],
        page: &PageRequest,
    ) -> ServiceResult<Vec<SubscriberRow>> {
        let state = self.state.lock().unwrap();

        let mut keys: BTreeMap<String, i64> = BTreeMap::new();
        for row in state.matching(channels) {
            let key = keys.entry(row.user_id.clone()).or_insert(row.id);
            *key = (*key).max(row.id);
        }

        let mut rows: Vec<SubscriberRow> = keys
            .into_iter()
            .map(|(user_id, id)| SubscriberRow { id, user_id })
            .filter(|r| page.before_id.map_or(true, |before| r.id < before))
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(page.limit as usize);
        Ok(rows)
    }

    async fn count_subscribers(&self, channels: &[String]) -> ServiceResult<i64> {
        let state = self.state.lock().unwrap();
        let mut users: Vec<&str> = state.matching(channels).map(|r| r.user_id.as_str()).collect();
        users.sort();
        users.dedup();
        Ok(users.len() as i64)
    }
}

enum Staged {
    Insert { user_id: String, channel: String },
    Delete { user_id: String, channel: String },
}

pub struct InMemoryTx {
    store: InMemoryStore,
    staged: Vec<Staged>,
}

impl InMemoryTx {
    fn is_staged_insert(&self, user_id: &str, channel: &str) -> bool {
        self.staged.iter().any(|s| {
            matches!(s, Staged::Insert { user_id: u, channel: c } if u == user_id && c == channel)
        })
    }

    fn is_staged_delete(&self, user_id: &str, channel: &str) -> bool {
        self.staged.iter().any(|s| {
            matches!(s, Staged::Delete { user_id: u, channel: c } if u == user_id && c == channel)
        })
    }
}

#[async_trait]
impl SubscriptionTx for InMemoryTx {
    async fn insert_missing(
        &mut self,
        user_id: &str,
        channels: &[String],
    ) -> ServiceResult<Vec<String>> {
        if self.store.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::internal("insert failed"));
        }

        let mut inserted = Vec::new();
        for channel in channels {
            let active = self.store.state.lock().unwrap().is_active(user_id, channel);
            if !active && !self.is_staged_insert(user_id, channel) {
                self.staged.push(Staged::Insert {
                    user_id: user_id.to_string(),
                    channel: channel.clone(),
                });
                inserted.push(channel.clone());
            }
        }
        Ok(inserted)
    }

    async fn soft_delete(
        &mut self,
        user_id: &str,
        channels: &[String],
    ) -> ServiceResult<Vec<String>> {
        if self.store.fail_writes.load(Ordering::SeqCst) {
            return Err(ServiceError::internal("delete failed"));
        }

        let mut removed = Vec::new();
        for channel in channels {
            let active = self.store.state.lock().unwrap().is_active(user_id, channel);
            if active && !self.is_staged_delete(user_id, channel) {
                self.staged.push(Staged::Delete {
                    user_id: user_id.to_string(),
                    channel: channel.clone(),
                });
                removed.push(channel.clone());
            }
        }
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> ServiceResult<()> {
        if self.store.fail_commit.load(Ordering::SeqCst) {
            return Err(ServiceError::internal("commit failed"));
        }

        let mut state = self.store.state.lock().unwrap();
        for staged in &self.staged {
            match staged {
                Staged::Insert { user_id, channel } => {
                    state.insert(user_id, channel);
                }
                Staged::Delete { user_id, channel } => {
                    for row in state
                        .rows
                        .iter_mut()
                        .filter(|r| !r.deleted && &r.user_id == user_id && &r.channel == channel)
                    {
                        row.deleted = true;
                    }
                }
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> ServiceResult<()> {
        self.store.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

// ============================================
// Channel counter doubles
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterCall {
    Increment(Vec<String>),
    Decrement(Vec<String>),
}

#[derive(Clone, Default)]
pub struct RecordingCounter {
    calls: Arc<Mutex<Vec<CounterCall>>>,
    fail_increments: Arc<AtomicBool>,
    fail_decrements: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl RecordingCounter {
    pub fn calls(&self) -> Vec<CounterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_increments(&self, on: bool) {
        self.fail_increments.store(on, Ordering::SeqCst);
    }

    pub fn fail_decrements(&self, on: bool) {
        self.fail_decrements.store(on, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    async fn record(&self, call: CounterCall, fail: bool, op: &'static str) -> ServiceResult<()> {
        self.calls.lock().unwrap().push(call);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if fail {
            return Err(ServiceError::internal("channel service unavailable").with_op(op));
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelCounterClient for RecordingCounter {
    async fn increment_subscribers(
        &self,
        _ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()> {
        let fail = self.fail_increments.load(Ordering::SeqCst);
        self.record(
            CounterCall::Increment(channels.to_vec()),
            fail,
            "IncrementSubscribers",
        )
        .await
    }

    async fn decrement_subscribers(
        &self,
        _ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()> {
        let fail = self.fail_decrements.load(Ordering::SeqCst);
        self.record(
            CounterCall::Decrement(channels.to_vec()),
            fail,
            "DecrementSubscribers",
        )
        .await
    }
}

// ============================================
// Harnesses
// ============================================

/// Registry wired to a recording counter
pub struct Harness {
    pub registry: SubscriberRegistry,
    pub store: InMemoryStore,
    pub counter: RecordingCounter,
    pub metrics: SubscriberMetrics,
}

pub fn harness(accounts: MockAccounts) -> Harness {
    let store = InMemoryStore::new();
    let counter = RecordingCounter::default();
    let metrics = SubscriberMetrics::new();

    let registry = SubscriberRegistry::new(
        Arc::new(store.clone()),
        Arc::new(counter.clone()),
        Arc::new(accounts),
        Arc::new(authorizer()),
        codec(),
    )
    .with_metrics(metrics.clone());

    Harness {
        registry,
        store,
        counter,
        metrics,
    }
}

/// Counter client that calls a channel service in this process
#[derive(Clone)]
pub struct InProcessChannelCounter {
    channels: ChannelService,
}

impl InProcessChannelCounter {
    pub fn new(channels: ChannelService) -> Self {
        Self { channels }
    }
}

#[async_trait]
impl ChannelCounterClient for InProcessChannelCounter {
    async fn increment_subscribers(
        &self,
        ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()> {
        self.channels.increment_subscribers(ctx, channels).await
    }

    async fn decrement_subscribers(
        &self,
        ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()> {
        self.channels.decrement_subscribers(ctx, channels).await
    }
}

/// Registry wired to a real channel service over in-memory storage
pub struct EndToEnd {
    pub registry: SubscriberRegistry,
    pub store: InMemoryStore,
    pub channels: ChannelService,
    pub channel_repo: Arc<InMemoryChannelRepository>,
}

pub async fn end_to_end(titles: &[&str]) -> EndToEnd {
    let channel_repo = Arc::new(InMemoryChannelRepository::new());
    let channels = ChannelService::new(channel_repo.clone(), Arc::new(authorizer()), codec());

    for title in titles {
        channels
            .create_channel(
                &as_admin(),
                NewChannel {
                    title: title.to_string(),
                    owner_id: "root".to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("channel fixture");
    }

    let store = InMemoryStore::new();
    let registry = SubscriberRegistry::new(
        Arc::new(store.clone()),
        Arc::new(InProcessChannelCounter::new(channels.clone())),
        Arc::new(known_accounts()),
        Arc::new(authorizer()),
        codec(),
    );

    EndToEnd {
        registry,
        store,
        channels,
        channel_repo,
    }
}
