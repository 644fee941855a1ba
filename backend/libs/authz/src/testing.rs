//! Token-table authorizer and HS256 token minting for tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::{AuthError, AuthPayload, Authorizer, Claims, RequestContext};

/// Mint a bearer token that `JwtAuthorizer::new(secret, ..)` accepts.
pub fn issue_token(
    secret: &[u8],
    subject_id: &str,
    groups: &[String],
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject_id.to_string(),
        groups: groups.to_vec(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::Issue(e.to_string()))
}

/// Maps fixed bearer tokens to identities. Unknown tokens are invalid.
#[derive(Debug, Clone)]
pub struct StaticAuthorizer {
    identities: HashMap<String, AuthPayload>,
    admin_groups: Vec<String>,
}

impl Default for StaticAuthorizer {
    fn default() -> Self {
        Self {
            identities: HashMap::new(),
            admin_groups: vec!["admin".to_string()],
        }
    }
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, token: &str, subject_id: &str, groups: &[&str]) -> Self {
        self.identities.insert(
            token.to_string(),
            AuthPayload {
                subject_id: subject_id.to_string(),
                groups: groups.iter().map(|g| g.to_string()).collect(),
            },
        );
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authenticate_request(&self, ctx: &RequestContext) -> Result<AuthPayload, AuthError> {
        let token = ctx.bearer_token()?;
        self.identities
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".into()))
    }

    fn admin_groups(&self) -> &[String] {
        &self.admin_groups
    }
}
