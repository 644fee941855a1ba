//! Channel Counter Service
//!
//! Owns the `channels` table: channel CRUD with cursor pagination, and the
//! atomic subscriber counters that the subscriber registry keeps in step
//! with its membership rows.

pub mod config;
pub mod db;
pub mod models;
pub mod repository;
pub mod service;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::Config;
pub use models::{ChannelChanges, ChannelFilter, ChannelKey, ChannelRecord, NewChannel};
pub use repository::{ChannelRepository, PgChannelRepository};
pub use service::{ChannelService, ListChannelsRequest, MAX_CHANNEL_PAGE_SIZE};
