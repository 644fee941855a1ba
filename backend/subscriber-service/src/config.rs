/// Configuration management for Subscriber Service
///
/// Loads configuration from environment variables.
use std::fmt;
use std::time::Duration;

use anyhow::Result;
use authz::JwtAuthorizer;
use cursor_codec::CursorCodec;
use db_pool::env_utils::{parse_env_list, parse_env_with_default, required_env};
use db_pool::DbConfig;

pub const SERVICE_NAME: &str = "subscriber-service";

#[derive(Clone)]
pub struct Config {
    pub database: DbConfig,
    pub jwt_secret: String,
    pub admin_groups: Vec<String>,
    pub cursor_min_length: usize,
    /// Bound on every remote call (counter updates, account lookups)
    pub remote_call_timeout_secs: u64,
    pub account_service_url: String,
    pub channel_service_url: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database)
            .field("jwt_secret", &"[REDACTED]")
            .field("admin_groups", &self.admin_groups)
            .field("cursor_min_length", &self.cursor_min_length)
            .field("remote_call_timeout_secs", &self.remote_call_timeout_secs)
            .field("account_service_url", &self.account_service_url)
            .field("channel_service_url", &self.channel_service_url)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DbConfig::from_env(SERVICE_NAME)?,
            jwt_secret: required_env("JWT_SECRET")?,
            admin_groups: parse_env_list("ADMIN_GROUPS", &["admin"]),
            cursor_min_length: parse_env_with_default("CURSOR_MIN_LENGTH", 10),
            remote_call_timeout_secs: parse_env_with_default("REMOTE_CALL_TIMEOUT_SECS", 10),
            account_service_url: required_env("ACCOUNT_SERVICE_URL")?,
            channel_service_url: required_env("CHANNEL_SERVICE_URL")?,
        })
    }

    pub fn remote_call_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_call_timeout_secs)
    }

    pub fn cursor_codec(&self) -> CursorCodec {
        CursorCodec::from_key_material(self.jwt_secret.as_bytes(), self.cursor_min_length)
    }

    pub fn authorizer(&self) -> JwtAuthorizer {
        JwtAuthorizer::new(self.jwt_secret.as_bytes(), self.admin_groups.clone())
    }
}
