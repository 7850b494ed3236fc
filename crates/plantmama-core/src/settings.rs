//! Application settings read from the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::config;

/// Default chat model for the agent.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default model for the encyclopedia and watering helpers.
pub const DEFAULT_AUX_MODEL: &str = "gpt-4.1-mini";

/// Default OpenAI-compatible API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default webhook port.
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

/// Default maximum accepted photo size (10 MiB).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

/// Errors raised while loading settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} is not set. Add it to your environment or .env file.")]
    Missing(&'static str),

    /// A variable has a value that cannot be parsed.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Logging verbosity accepted in `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Everything including debug output.
    Debug,
    /// Informational messages.
    #[default]
    Info,
    /// Warnings and errors.
    Warning,
    /// Errors only.
    Error,
    /// Treated as errors only.
    Critical,
}

impl LogLevel {
    /// The matching `tracing` filter directive.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Everything the bot needs to start.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Human-readable application name.
    pub app_name: String,
    /// Debug mode (human-readable logs).
    pub debug: bool,
    /// Deployment environment label.
    pub environment: String,
    /// Log level.
    pub log_level: LogLevel,

    /// OpenAI API key.
    pub openai_api_key: String,
    /// Chat model used by the agent.
    pub openai_model: String,
    /// Model used for the encyclopedia and watering helpers.
    pub openai_aux_model: String,
    /// Base URL of the OpenAI-compatible API.
    pub openai_base_url: String,

    /// Telegram bot token.
    pub telegram_bot_token: String,
    /// Public webhook URL; polling is used when absent.
    pub telegram_webhook_url: Option<String>,
    /// Local port for the webhook listener.
    pub telegram_webhook_port: u16,

    /// Directory for JSON records.
    pub data_dir: PathBuf,
    /// Directory for processed uploads.
    pub upload_dir: PathBuf,
    /// Largest accepted photo in bytes.
    pub max_image_size: u64,

    /// Requests allowed per user per window.
    pub rate_limit_per_user: u32,
    /// Rate limit window in seconds.
    pub rate_limit_window_secs: u64,
}

impl Settings {
    /// Load settings from process environment variables.
    ///
    /// Creates the upload directory as a side effect.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self::from_lookup(|key| std::env::var(key).ok())?;
        ensure_upload_dir(&settings.upload_dir);
        Ok(settings)
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_level = match get("LOG_LEVEL") {
            Some(v) => v.parse::<LogLevel>().map_err(|reason| ConfigError::Invalid {
                name: "LOG_LEVEL",
                value: v.clone(),
                reason,
            })?,
            None => LogLevel::default(),
        };

        Ok(Self {
            app_name: get("APP_NAME").unwrap_or_else(|| "PlantMama AI Agent".to_string()),
            debug: parse_or("DEBUG", get("DEBUG"), false, parse_bool)?,
            environment: get("ENVIRONMENT").unwrap_or_else(|| "production".to_string()),
            log_level,

            openai_api_key: get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?,
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_aux_model: get("OPENAI_AUX_MODEL")
                .unwrap_or_else(|| DEFAULT_AUX_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),

            telegram_bot_token: get("TELEGRAM_BOT_TOKEN")
                .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?,
            telegram_webhook_url: get("TELEGRAM_WEBHOOK_URL"),
            telegram_webhook_port: parse_or(
                "TELEGRAM_WEBHOOK_PORT",
                get("TELEGRAM_WEBHOOK_PORT"),
                DEFAULT_WEBHOOK_PORT,
                parse_num,
            )?,

            data_dir: get(config::DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(config::data_dir),
            upload_dir: get(config::UPLOAD_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(config::uploads_dir),
            max_image_size: parse_or(
                "MAX_IMAGE_SIZE",
                get("MAX_IMAGE_SIZE"),
                DEFAULT_MAX_IMAGE_SIZE,
                parse_num,
            )?,

            rate_limit_per_user: parse_or(
                "RATE_LIMIT_PER_USER",
                get("RATE_LIMIT_PER_USER"),
                30,
                parse_num,
            )?,
            rate_limit_window_secs: parse_or(
                "RATE_LIMIT_WINDOW",
                get("RATE_LIMIT_WINDOW"),
                60,
                parse_num,
            )?,
        })
    }

    /// Settings for tests, rooted in `dir`, without touching the environment.
    pub fn for_tests(dir: &Path) -> Self {
        Self {
            app_name: "PlantMama AI Agent".to_string(),
            debug: true,
            environment: "test".to_string(),
            log_level: LogLevel::Debug,
            openai_api_key: "test-key".to_string(),
            openai_model: DEFAULT_MODEL.to_string(),
            openai_aux_model: DEFAULT_AUX_MODEL.to_string(),
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            telegram_bot_token: "123:test".to_string(),
            telegram_webhook_url: None,
            telegram_webhook_port: DEFAULT_WEBHOOK_PORT,
            data_dir: dir.join("data"),
            upload_dir: dir.join("uploads"),
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
            rate_limit_per_user: 30,
            rate_limit_window_secs: 60,
        }
    }

    /// Whether the bot should run in webhook mode.
    pub fn uses_webhook(&self) -> bool {
        self.telegram_webhook_url.is_some()
    }
}

fn parse_or<T>(
    name: &'static str,
    value: Option<String>,
    default: T,
    parse: fn(&str) -> Result<T, String>,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => parse(v.trim()).map_err(|reason| ConfigError::Invalid {
            name,
            value: v,
            reason,
        }),
        None => Ok(default),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected a boolean".to_string()),
    }
}

fn parse_num<T: FromStr>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| "expected a number".to_string())
}

/// Create the upload directory, warning when that fails.
fn ensure_upload_dir(dir: &Path) -> bool {
    match std::fs::create_dir_all(dir) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Failed to create upload directory");
            false
        }
    }
}
