//! Caller authentication and authorization
//!
//! Services never inspect credentials themselves. They receive an
//! [`Authorizer`] at construction time and ask it one of three questions:
//!
//! - who is calling (`authenticate_request`)
//! - is the caller this subject (`authorize_actor`)
//! - is the caller this subject, or a member of one of these groups
//!   (`authorize_actor_or_group`)
//!
//! An empty subject never matches, so `authorize_actor_or_group(ctx, "", groups)`
//! is a pure group check.

mod context;
mod error;
mod jwt;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use context::RequestContext;
pub use error::AuthError;
pub use jwt::{Claims, JwtAuthorizer};

use async_trait::async_trait;

/// Identity of an authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    pub subject_id: String,
    pub groups: Vec<String>,
}

impl AuthPayload {
    pub fn in_any_group(&self, groups: &[String]) -> bool {
        self.groups.iter().any(|g| groups.contains(g))
    }
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authenticate_request(&self, ctx: &RequestContext) -> Result<AuthPayload, AuthError>;

    /// Groups whose members may act on behalf of any subject
    fn admin_groups(&self) -> &[String];

    async fn authorize_actor(
        &self,
        ctx: &RequestContext,
        subject_id: &str,
    ) -> Result<AuthPayload, AuthError> {
        self.authorize_actor_or_group(ctx, subject_id, &[]).await
    }

    async fn authorize_actor_or_group(
        &self,
        ctx: &RequestContext,
        subject_id: &str,
        groups: &[String],
    ) -> Result<AuthPayload, AuthError> {
        let payload = self.authenticate_request(ctx).await?;

        let is_actor = !subject_id.is_empty() && payload.subject_id == subject_id;
        if is_actor || payload.in_any_group(groups) {
            return Ok(payload);
        }

        tracing::debug!(
            caller = %payload.subject_id,
            subject = %subject_id,
            request_id = %ctx.request_id,
            "authorization denied"
        );
        Err(AuthError::Forbidden {
            caller: payload.subject_id,
        })
    }

    async fn authorize_actor_or_admin(
        &self,
        ctx: &RequestContext,
        subject_id: &str,
    ) -> Result<AuthPayload, AuthError> {
        self.authorize_actor_or_group(ctx, subject_id, self.admin_groups())
            .await
    }

    async fn authorize_admin(&self, ctx: &RequestContext) -> Result<AuthPayload, AuthError> {
        self.authorize_actor_or_group(ctx, "", self.admin_groups())
            .await
    }

    fn is_admin(&self, payload: &AuthPayload) -> bool {
        payload.in_any_group(self.admin_groups())
    }
}
