use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`ChatApi`](crate::api::ChatApi) implementation.
///
/// The variants mirror what the chat platform can tell us about a failed call,
/// so the delivery engine can decide between waiting, retrying, falling back
/// to a fresh send, or giving up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server asked us to back off before issuing any further calls.
    #[error("rate limited by server, retry after {}s", retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },

    /// Timeouts, dropped connections and other transport failures.
    #[error("network error: {0}")]
    Network(String),

    /// The message exists but cannot be edited into the requested shape.
    #[error("message cannot be edited: {0}")]
    EditUnsupported(String),

    /// Blocked recipient, malformed request, or anything else not worth retrying.
    #[error("request rejected: {0}")]
    Fatal(String),
}

/// What the retry loop should do with a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient failure, retry within the bounded budget.
    Retryable,
    /// Server-mandated wait; never counts against the retry budget.
    RateLimited(Duration),
    /// Edit rejected; the caller should send a new message instead.
    EditFallback,
    /// Give up immediately.
    Fatal,
}

impl ApiError {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::RateLimited { retry_after } => Disposition::RateLimited(*retry_after),
            Self::Network(_) => Disposition::Retryable,
            Self::EditUnsupported(_) => Disposition::EditFallback,
            Self::Fatal(_) => Disposition::Fatal,
        }
    }
}

/// Result type alias for raw chat API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors surfaced to callers of [`DispatchEngine`](crate::dispatch::DispatchEngine).
///
/// Rate limiting and edit fallbacks are absorbed by the engine and never
/// show up here.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Network failures persisted past the configured retry budget.
    #[error("delivery failed after {attempts} attempts: {reason}")]
    Network { attempts: u32, reason: String },

    /// The platform rejected the request permanently.
    #[error("delivery rejected: {0}")]
    Api(String),

    /// The payload could not be read.
    #[error("failed to read payload: {0}")]
    Payload(#[from] std::io::Error),
}

/// Result type alias for delivery operations.
pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
