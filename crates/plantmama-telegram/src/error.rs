//! Error types for the Telegram bot.

use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    BotStartFailed(String),

    /// Webhook registration failed.
    #[error("Failed to register webhook: {0}")]
    WebhookFailed(String),

    /// Settings could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] plantmama_core::ConfigError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] plantmama_persistence::PersistenceError),

    /// Agent could not be created.
    #[error("Agent error: {0}")]
    Agent(#[from] plantmama_agent::AgentError),

    /// Telegram API request failed.
    #[error("Telegram API error: {0}")]
    Request(#[from] teloxide::RequestError),

    /// File download failed.
    #[error("Download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
