//! Client configuration with serde defaults and environment overrides.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_BASE_URL: &str = "LISTING_FEE_BASE_URL";
pub const ENV_AUTH_TOKEN: &str = "LISTING_FEE_AUTH_TOKEN";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "LISTING_FEE_REQUEST_TIMEOUT_MS";
pub const ENV_VERIFICATION_TTL_SECS: &str = "LISTING_FEE_VERIFICATION_TTL_SECS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("env {name} has invalid value `{value}`")]
    InvalidValue { name: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST backend root, e.g. `https://api.example.com/api/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every backend request.
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Lifetime of a verification challenge, counted from the moment the
    /// backend asks for a code (or a resend is acknowledged).
    #[serde(default = "default_verification_ttl_secs")]
    pub verification_ttl_secs: u64,

    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            request_timeout_ms: default_request_timeout_ms(),
            verification_ttl_secs: default_verification_ttl_secs(),
            countdown_tick_ms: default_countdown_tick_ms(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by any `LISTING_FEE_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(base_url) = env::var(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Ok(token) = env::var(ENV_AUTH_TOKEN) {
            config.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(timeout) = parse_env_u64(ENV_REQUEST_TIMEOUT_MS)? {
            config.request_timeout_ms = timeout;
        }
        if let Some(ttl) = parse_env_u64(ENV_VERIFICATION_TTL_SECS)? {
            config.verification_ttl_secs = ttl;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Zero("request_timeout_ms"));
        }
        if self.verification_ttl_secs == 0 {
            return Err(ConfigError::Zero("verification_ttl_secs"));
        }
        if self.countdown_tick_ms == 0 {
            return Err(ConfigError::Zero("countdown_tick_ms"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn verification_ttl(&self) -> chrono::Duration {
        i64::try_from(self.verification_ttl_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }
}

fn parse_env_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api/v1".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

const fn default_verification_ttl_secs() -> u64 {
    15 * 60
}

const fn default_countdown_tick_ms() -> u64 {
    1_000
}
