//! # courier-core
//!
//! Rate-limited delivery of chat bot updates.
//!
//! Sits between bot logic and the chat platform and gets every text, photo,
//! video or animation (plus its inline keyboard) delivered without tripping
//! the platform's flood limits:
//!
//! - **Admission**: a server-imposed cooldown, per-chat and global sliding
//!   windows, and a minimum pacing delay, all shared by every delivery
//! - **Retries**: server retry-afters are waited out indefinitely; network
//!   failures are retried with backoff up to a fixed budget
//! - **Fallbacks**: refused edits turn into fresh messages, reusing the same
//!   payload
//!
//! ## Key Components
//!
//! - [`RateWindow`] — Sliding-window gate for one dimension
//! - [`CompositeLimiter`] — Cooldown, group windows, global window and pacing
//! - [`DispatchEngine`] — Chooses edit vs. send and media kind, drives retries
//! - [`Payload`] — In-memory, stream or file media behind one interface
//! - [`ChatApi`] — The platform primitives the engine calls
//! - [`MessageOwners`] — Remembers which user each keyboard message belongs to
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier_core::{
//!     ChatApi, ChatTarget, CompositeLimiter, CourierConfig, DeliveryRequest,
//!     DispatchEngine, MessageOwners, Payload,
//! };
//!
//! async fn post_card(api: Arc<dyn ChatApi>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CourierConfig::from_env()?;
//!     let limiter = CompositeLimiter::new(&config.limits);
//!     let engine = DispatchEngine::new(api, Arc::new(MessageOwners::new()), config.limits.max_retries);
//!
//!     let request = DeliveryRequest::media(
//!         ChatTarget::Id(-100_123),
//!         Payload::from_path("cards/legendary.gif"),
//!         "You pulled a legendary card!",
//!     )
//!     .owned_by(42);
//!     let message = engine.deliver(request, &limiter).await?;
//!     println!("delivered as {message}");
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod owners;
pub mod payload;
pub mod types;

pub use api::ChatApi;
pub use broadcast::BroadcastSummary;
pub use config::{CourierConfig, LimiterConfig};
pub use dispatch::{
    BASE_RETRY_DELAY, DeliveryRequest, DispatchEngine, MAX_RETRY_DELAY, MIN_COOLDOWN_SLEEP,
    backoff_delay,
};
pub use error::{
    ApiError, ApiResult, ConfigError, ConfigResult, DeliveryError, DeliveryResult, Disposition,
};
pub use limiter::{CompositeLimiter, RETRY_AFTER_BUFFER, RateWindow};
pub use owners::{MessageOwners, OwnershipRecorder};
pub use payload::{MediaStream, Payload};
pub use types::{
    ButtonAction, ChatTarget, InlineButton, InlineKeyboard, MediaKind, MediaUpload, MessageId,
    MessageRef, OwnerId, ParseTargetError,
};
