//! Subscriber Registry Service
//!
//! Owns the `subscriptions` table. Joining or leaving channels writes
//! membership rows inside a local transaction and moves the channel
//! service's subscriber counters with one remote call; the local change is
//! committed only once that call has succeeded.

pub mod config;
pub mod counter;
pub mod db;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod store;

pub use config::Config;
pub use counter::{ChannelCounterClient, HttpChannelCounter};
pub use metrics::SubscriberMetrics;
pub use models::{ListSubscribersRequest, Subscriber, SubscriberRow};
pub use registry::{SubscriberRegistry, MAX_SUBSCRIBER_PAGE_SIZE};
pub use store::{PgSubscriptionStore, SubscriptionStore, SubscriptionTx};
