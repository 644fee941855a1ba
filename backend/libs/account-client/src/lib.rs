//! Account profile lookups
//!
//! Subscriber profiles (name and contact details) live in the account
//! service. This crate defines the capability the registry depends on and
//! the HTTP implementation used in deployments.

use std::time::Duration;

use async_trait::async_trait;
use error_types::ServiceError;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Public profile of an account. Contact fields are only populated for
/// privileged lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account {0} not found")]
    NotFound(String),

    #[error("account service request failed: {0}")]
    Transport(String),

    #[error("account service returned {status}: {body}")]
    Unexpected { status: u16, body: String },
}

impl AccountError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AccountError::NotFound(_))
    }
}

impl From<AccountError> for ServiceError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(_) => ServiceError::NotFound(err.to_string()),
            _ => ServiceError::Internal(err.to_string()),
        }
    }
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn get_account(&self, account_id: &str, privileged: bool)
        -> Result<Account, AccountError>;
}

/// Account directory backed by the account service's REST API
pub struct HttpAccountDirectory {
    client: Client,
    base_url: Url,
}

impl HttpAccountDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AccountError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AccountError::Transport(e.to_string()))?;
        let base_url = Url::parse(base_url)
            .map_err(|e| AccountError::Transport(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AccountError::Transport(format!(
                "invalid base url {}",
                base_url
            )));
        }

        Ok(Self { client, base_url })
    }

    /// `{base}/v1/accounts/{id}` with the ID as one percent-encoded segment.
    fn account_url(&self, account_id: &str) -> Result<Url, AccountError> {
        if matches!(account_id, "" | "." | "..") {
            return Err(AccountError::NotFound(account_id.to_string()));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AccountError::Transport(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "accounts"])
            .push(account_id);
        Ok(url)
    }
}

#[async_trait]
impl AccountDirectory for HttpAccountDirectory {
    async fn get_account(
        &self,
        account_id: &str,
        privileged: bool,
    ) -> Result<Account, AccountError> {
        let url = self.account_url(account_id)?;

        let response = self
            .client
            .get(url)
            .query(&[("privileged", privileged)])
            .send()
            .await
            .map_err(|e| AccountError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(account_id, "account not found");
                Err(AccountError::NotFound(account_id.to_string()))
            }
            status if status.is_success() => response
                .json::<Account>()
                .await
                .map_err(|e| AccountError::Transport(format!("parse failed: {}", e))),
            status => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                warn!(account_id, status = status.as_u16(), "account lookup failed");
                Err(AccountError::Unexpected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
