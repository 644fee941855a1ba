use tonic::metadata::MetadataMap;
use uuid::Uuid;

use crate::AuthError;

const AUTHORIZATION: &str = "authorization";
const REQUEST_ID: &str = "x-request-id";

/// Per-request caller information handed to every service operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    authorization: Option<String>,
    pub request_id: Uuid,
}

impl RequestContext {
    /// Context with no credentials.
    pub fn anonymous() -> Self {
        Self {
            authorization: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn with_bearer(token: impl AsRef<str>) -> Self {
        Self {
            authorization: Some(format!("Bearer {}", token.as_ref())),
            request_id: Uuid::new_v4(),
        }
    }

    /// Read `authorization` and `x-request-id` from incoming gRPC metadata.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let authorization = metadata
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let request_id = metadata
            .get(REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or_else(Uuid::new_v4);

        Self {
            authorization,
            request_id,
        }
    }

    /// Raw `authorization` value, for forwarding to downstream services.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn bearer_token(&self) -> Result<&str, AuthError> {
        let header = self
            .authorization
            .as_deref()
            .ok_or(AuthError::MissingCredentials)?;

        header
            .strip_prefix("Bearer ")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("expected 'Bearer <token>'".into()))
    }
}
