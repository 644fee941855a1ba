//! In-memory channel storage for tests

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use cursor_codec::PageRequest;
use error_types::{ServiceError, ServiceResult};
use tokio::sync::Mutex;

use crate::models::{ChannelChanges, ChannelFilter, ChannelKey, ChannelRecord, NewChannel};
use crate::repository::ChannelRepository;

#[derive(Default)]
struct State {
    last_id: i64,
    rows: BTreeMap<i64, ChannelRecord>,
}

/// Behaves like the Postgres repository, including the unique title rule.
#[derive(Default)]
pub struct InMemoryChannelRepository {
    state: Mutex<State>,
}

impl InMemoryChannelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter of the channel with this title, deleted or not
    pub async fn subscribers_of(&self, title: &str) -> Option<i32> {
        let state = self.state.lock().await;
        state
            .rows
            .values()
            .find(|c| c.title == title)
            .map(|c| c.subscribers)
    }
}

fn matches(filter: &ChannelFilter, channel: &ChannelRecord) -> bool {
    filter
        .owner_id
        .as_ref()
        .map_or(true, |owner| &channel.owner_id == owner)
}

#[async_trait]
impl ChannelRepository for InMemoryChannelRepository {
    async fn create(&self, channel: &NewChannel) -> ServiceResult<ChannelRecord> {
        let mut state = self.state.lock().await;
        if state.rows.values().any(|c| c.title == channel.title) {
            return Err(ServiceError::invalid_argument(format!(
                "channel title {} already exists",
                channel.title
            )));
        }

        state.last_id += 1;
        let record = ChannelRecord {
            id: state.last_id,
            title: channel.title.clone(),
            label: channel.label.clone(),
            description: channel.description.clone(),
            owner_id: channel.owner_id.clone(),
            subscribers: 0,
            created_at: Utc::now(),
            deleted_at: None,
        };
        state.rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: i64,
        changes: &ChannelChanges,
    ) -> ServiceResult<Option<ChannelRecord>> {
        let mut state = self.state.lock().await;

        if let Some(title) = &changes.title {
            if state.rows.values().any(|c| c.id != id && &c.title == title) {
                return Err(ServiceError::invalid_argument(format!(
                    "channel title {} already exists",
                    title
                )));
            }
        }

        let Some(record) = state.rows.get_mut(&id).filter(|c| !c.is_deleted()) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            record.title = title.clone();
        }
        if let Some(label) = &changes.label {
            record.label = label.clone();
        }
        if let Some(description) = &changes.description {
            record.description = description.clone();
        }
        if let Some(owner_id) = &changes.owner_id {
            record.owner_id = owner_id.clone();
        }
        Ok(Some(record.clone()))
    }

    async fn soft_delete(&self, id: i64) -> ServiceResult<bool> {
        let mut state = self.state.lock().await;
        match state.rows.get_mut(&id).filter(|c| !c.is_deleted()) {
            Some(record) => {
                record.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, key: &ChannelKey) -> ServiceResult<Option<ChannelRecord>> {
        let state = self.state.lock().await;
        let found = match key {
            ChannelKey::Id(id) => state.rows.get(id).cloned(),
            ChannelKey::Title(title) => state.rows.values().find(|c| &c.title == title).cloned(),
        };
        Ok(found)
    }

    async fn find_live(&self, id: i64) -> ServiceResult<Option<ChannelRecord>> {
        let state = self.state.lock().await;
        Ok(state.rows.get(&id).filter(|c| !c.is_deleted()).cloned())
    }

    async fn list_page(
        &self,
        filter: &ChannelFilter,
        page: &PageRequest,
    ) -> ServiceResult<Vec<ChannelRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .values()
            .rev()
            .filter(|c| page.before_id.map_or(true, |before| c.id < before))
            .filter(|c| matches(filter, c))
            .take(page.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &ChannelFilter) -> ServiceResult<i64> {
        let state = self.state.lock().await;
        Ok(state.rows.values().filter(|c| matches(filter, c)).count() as i64)
    }

    async fn adjust_subscribers(
        &self,
        titles: &[String],
        delta: i32,
    ) -> ServiceResult<Vec<(String, i32)>> {
        let mut state = self.state.lock().await;
        Ok(state
            .rows
            .values_mut()
            .filter(|c| !c.is_deleted() && titles.contains(&c.title))
            .map(|c| {
                c.subscribers += delta;
                (c.title.clone(), c.subscribers)
            })
            .collect())
    }
}
