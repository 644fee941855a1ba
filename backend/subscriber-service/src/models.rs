use account_client::Account;
use serde::Serialize;

/// One subscriber in a listing, keyed by its highest matching membership row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SubscriberRow {
    pub id: i64,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscriber {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub channels: Vec<String>,
}

impl Subscriber {
    /// Contact fields are dropped unless the lookup was privileged.
    pub fn from_account(account: Account, channels: Vec<String>, privileged: bool) -> Self {
        let (email, phone) = if privileged {
            (account.email, account.phone)
        } else {
            (None, None)
        };

        Self {
            id: account.id,
            name: account.name,
            email,
            phone,
            channels,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListSubscribersRequest {
    pub page_size: i32,
    pub page_token: String,
    /// Only subscribers of at least one of these channels; empty means all
    pub channels: Vec<String>,
}
