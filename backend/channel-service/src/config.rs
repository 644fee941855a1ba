/// Configuration management for Channel Service
///
/// Loads configuration from environment variables.
use std::fmt;

use anyhow::Result;
use authz::JwtAuthorizer;
use cursor_codec::CursorCodec;
use db_pool::env_utils::{parse_env_list, parse_env_with_default, required_env};
use db_pool::DbConfig;

pub const SERVICE_NAME: &str = "channel-service";

#[derive(Clone)]
pub struct Config {
    pub database: DbConfig,
    /// Signing key for bearer tokens; also the key material for cursor salts
    pub jwt_secret: String,
    pub admin_groups: Vec<String>,
    pub cursor_min_length: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database", &self.database)
            .field("jwt_secret", &"[REDACTED]")
            .field("admin_groups", &self.admin_groups)
            .field("cursor_min_length", &self.cursor_min_length)
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
        })
    }

    pub fn cursor_codec(&self) -> CursorCodec {
        CursorCodec::from_key_material(self.jwt_secret.as_bytes(), self.cursor_min_length)
    }

    pub fn authorizer(&self) -> JwtAuthorizer {
        JwtAuthorizer::new(self.jwt_secret.as_bytes(), self.admin_groups.clone())
    }
}
