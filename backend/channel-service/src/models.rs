use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChannelRecord {
    pub id: i64,
    pub title: String,
    pub label: String,
    pub description: String,
    pub owner_id: String,
    /// Signed; decrements without a matching increment drive it below zero
    pub subscribers: i32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChannelRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChannel {
    pub title: String,
    pub label: String,
    pub description: String,
    pub owner_id: String,
}

impl NewChannel {
    pub(crate) fn normalized(self) -> Self {
        Self {
            title: self.title.trim().to_string(),
            label: self.label.trim().to_string(),
            description: self.description.trim().to_string(),
            owner_id: self.owner_id.trim().to_string(),
        }
    }
}

/// Columns an update may touch. `id` and `subscribers` are not among them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelChanges {
    pub title: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<String>,
}

impl ChannelChanges {
    /// Empty fields of the submitted record mean "leave unchanged".
    pub fn from_submitted(submitted: &ChannelRecord) -> Self {
        fn non_empty(value: &str) -> Option<String> {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }

        Self {
            title: non_empty(&submitted.title),
            label: non_empty(&submitted.label),
            description: non_empty(&submitted.description),
            owner_id: non_empty(&submitted.owner_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.label.is_none()
            && self.description.is_none()
            && self.owner_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKey {
    Id(i64),
    Title(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    pub owner_id: Option<String>,
}
