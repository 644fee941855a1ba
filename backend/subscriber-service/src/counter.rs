use std::time::Duration;

use async_trait::async_trait;
use authz::RequestContext;
use error_types::{ServiceError, ServiceResult};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, warn};

const AUTHORIZATION: &str = "authorization";
const REQUEST_ID: &str = "x-request-id";

/// Remote subscriber counters kept by the channel service.
///
/// One call covers every channel in the list. The caller's request context
/// is forwarded so the channel service authenticates the same caller.
#[async_trait]
pub trait ChannelCounterClient: Send + Sync {
    async fn increment_subscribers(
        &self,
        ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()>;

    async fn decrement_subscribers(
        &self,
        ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()>;
}

#[derive(Debug, Serialize)]
struct CounterUpdate<'a> {
    channels: &'a [String],
}

/// Counter client backed by the channel service's REST API.
///
/// `POST {base}/v1/channels/subscribers:increment` (or `:decrement`) with
/// `{"channels": [...]}`. Non-success statuses map back onto error kinds so
/// the registry sees the same classification the channel service produced.
pub struct HttpChannelCounter {
    client: Client,
    base_url: Url,
}

impl HttpChannelCounter {
    pub fn new(base_url: &str, timeout: Duration) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::internal(format!("channel client: {}", e)))?;
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ServiceError::internal(format!("invalid channel service url {}", base_url))
            })?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, action: &str) -> ServiceResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::internal(format!("invalid channel service url {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["v1", "channels", action]);
        Ok(url)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        action: &'static str,
        channels: &[String],
    ) -> ServiceResult<()> {
        let mut request = self
            .client
            .post(self.endpoint(action)?)
            .header(REQUEST_ID, ctx.request_id.to_string())
            .json(&CounterUpdate { channels });
        if let Some(authorization) = ctx.authorization() {
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(|e| {
            warn!(request_id = %ctx.request_id, action, error = %e, "channel service unreachable");
            ServiceError::internal(format!("channel service request failed: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(request_id = %ctx.request_id, action, count = channels.len(), "counters updated");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(
            request_id = %ctx.request_id,
            action,
            status = status.as_u16(),
            "channel counter update rejected"
        );
        Err(status_error(status, body))
    }
}

fn status_error(status: StatusCode, body: String) -> ServiceError {
    let msg = format!("channel service returned {}: {}", status.as_u16(), body);
    match status {
        StatusCode::BAD_REQUEST => ServiceError::InvalidArgument(msg),
        StatusCode::UNAUTHORIZED => ServiceError::Unauthenticated(msg),
        StatusCode::FORBIDDEN => ServiceError::PermissionDenied(msg),
        StatusCode::NOT_FOUND => ServiceError::NotFound(msg),
        _ => ServiceError::Internal(msg),
    }
}

#[async_trait]
impl ChannelCounterClient for HttpChannelCounter {
    async fn increment_subscribers(
        &self,
        ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()> {
        self.update(ctx, "subscribers:increment", channels).await
    }

    async fn decrement_subscribers(
        &self,
        ctx: &RequestContext,
        channels: &[String],
    ) -> ServiceResult<()> {
        self.update(ctx, "subscribers:decrement", channels).await
    }
}
