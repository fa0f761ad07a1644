use thiserror::Error;

/// Result type alias for telegram operations.
pub type TelegramResult<T> = std::result::Result<T, TelegramError>;

/// Errors that can occur while setting up the Telegram backend.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Bot token is missing from config and environment.
    #[error("telegram bot token not found: set BOT_TOKEN or configure bot_token")]
    MissingBotToken,

    /// A keyboard button carries a URL Telegram would reject.
    #[error("invalid button url {url:?}: {reason}")]
    InvalidButtonUrl { url: String, reason: String },
}
