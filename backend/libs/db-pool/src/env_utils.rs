//! Environment variable parsing shared by the service `Config` loaders

use std::str::FromStr;

use anyhow::{Context, Result};

/// Parse an environment variable, falling back to `default` when unset or unparsable
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a required, non-empty environment variable
pub fn required_env(key: &str) -> Result<String> {
    let value = std::env::var(key).with_context(|| format!("{} must be set", key))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} must not be empty", key);
    }
    Ok(value)
}

/// Comma-separated list with blanks dropped; `default` when unset or empty
pub fn parse_env_list(key: &str, default: &[&str]) -> Vec<String> {
    let parsed: Vec<String> = std::env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();

    if parsed.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
}
