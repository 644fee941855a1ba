use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{AuthError, AuthPayload, Authorizer, RequestContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    #[serde(default)]
    pub groups: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 bearer-token authorizer.
///
/// The same secret is the deployment's key material for deriving cursor
/// salts, so both are configured from `JWT_SECRET`.
pub struct JwtAuthorizer {
    decoding: DecodingKey,
    validation: Validation,
    admin_groups: Vec<String>,
}

impl JwtAuthorizer {
    pub fn new(secret: &[u8], admin_groups: Vec<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding: DecodingKey::from_secret(secret),
            validation,
            admin_groups,
        }
    }
}

#[async_trait]
impl Authorizer for JwtAuthorizer {
    async fn authenticate_request(&self, ctx: &RequestContext) -> Result<AuthPayload, AuthError> {
        let token = ctx.bearer_token()?;

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            warn!(request_id = %ctx.request_id, error = %e, "JWT validation failed");
            AuthError::InvalidToken(e.to_string())
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }

        Ok(AuthPayload {
            subject_id: data.claims.sub,
            groups: data.claims.groups,
        })
    }

    fn admin_groups(&self) -> &[String] {
        &self.admin_groups
    }
}
