//! Channel name handling shared by both services
//!
//! Membership rows are keyed by channel name rather than channel ID, so the
//! subscriber registry and the channel service must agree on what a request's
//! list of names means before either one touches storage.

use error_types::{ServiceError, ServiceResult};

/// Trim and de-duplicate a request's channel names, keeping first occurrence order.
pub fn normalize_channel_names(names: &[String]) -> ServiceResult<Vec<String>> {
    if names.is_empty() {
        return Err(ServiceError::invalid_argument(
            "at least one channel is required",
        ));
    }

    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid_argument(
                "channel name must not be empty",
            ));
        }
        if !normalized.iter().any(|n| n == name) {
            normalized.push(name.to_string());
        }
    }
    Ok(normalized)
}
