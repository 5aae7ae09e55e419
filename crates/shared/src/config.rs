use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_bool_env, parse_u64_env, require_env};

const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_POLL_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 40_000;
const DEFAULT_POLL_RETRY_BASE_SECONDS: u64 = 1;
const DEFAULT_POLL_RETRY_MAX_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    pub telegram_api_base_url: String,
    pub poll_timeout_seconds: u64,
    pub http_timeout_ms: u64,
    pub skip_pending_updates: bool,
    pub poll_retry_base_seconds: u64,
    pub poll_retry_max_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Loads a `.env` file into the process environment. A missing file is fine;
/// an unreadable or malformed one is an error.
pub fn load_dotenv() -> Result<(), ConfigError> {
    accept_missing_dotenv(dotenvy::dotenv())
}

fn accept_missing_dotenv(result: Result<PathBuf, dotenvy::Error>) -> Result<(), ConfigError> {
    match result {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ConfigError::InvalidConfiguration(format!(
            "failed to load .env file: {err}"
        ))),
    }
}

impl BotConfig {
    /// Reads the bot configuration, loading a `.env` file first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv()?;

        let config = Self {
            telegram_bot_token: require_env("TELEGRAM_BOT_TOKEN")?,
            telegram_api_base_url: optional_trimmed_env("TELEGRAM_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE_URL.to_string()),
            poll_timeout_seconds: parse_u64_env(
                "TELEGRAM_POLL_TIMEOUT_SECONDS",
                DEFAULT_POLL_TIMEOUT_SECONDS,
            )?,
            http_timeout_ms: parse_u64_env("TELEGRAM_HTTP_TIMEOUT_MS", DEFAULT_HTTP_TIMEOUT_MS)?,
            skip_pending_updates: parse_bool_env("TELEGRAM_SKIP_PENDING_UPDATES", true)?,
            poll_retry_base_seconds: parse_u64_env(
                "POLL_RETRY_BASE_SECONDS",
                DEFAULT_POLL_RETRY_BASE_SECONDS,
            )?,
            poll_retry_max_seconds: parse_u64_env(
                "POLL_RETRY_MAX_SECONDS",
                DEFAULT_POLL_RETRY_MAX_SECONDS,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token.trim().is_empty() {
            return Err(ConfigError::MissingVar("TELEGRAM_BOT_TOKEN".to_string()));
        }

        if !self.telegram_api_base_url.starts_with("http://")
            && !self.telegram_api_base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidConfiguration(
                "TELEGRAM_API_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        if self.http_timeout_ms <= self.poll_timeout_seconds.saturating_mul(1_000) {
            return Err(ConfigError::InvalidConfiguration(
                "TELEGRAM_HTTP_TIMEOUT_MS must exceed the long-poll timeout".to_string(),
            ));
        }

        if self.poll_retry_base_seconds == 0
            || self.poll_retry_base_seconds > self.poll_retry_max_seconds
        {
            return Err(ConfigError::InvalidConfiguration(
                "POLL_RETRY_BASE_SECONDS must be positive and not exceed POLL_RETRY_MAX_SECONDS"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
