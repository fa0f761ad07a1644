//! # courier-telegram
//!
//! Telegram Bot API backend for courier.
//!
//! [`TelegramApi`] implements [`courier_core::ChatApi`] on top of a
//! `teloxide::Bot`, translating Telegram's failures into the delivery
//! engine's taxonomy:
//!
//! - `RetryAfter` → rate limited, waited out by the engine
//! - network and I/O failures → retried with backoff
//! - "message can't be edited" and friends → edit fallback
//! - everything else → surfaced to the caller
//!
//! ## Key Components
//!
//! - [`TelegramApi`] — `ChatApi` over teloxide
//! - [`map_request_error`] — `RequestError` → `ApiError`
//! - [`error`] — Error types for constructing the backend

mod bot;
pub mod error;

pub use bot::{TelegramApi, escape_html, keyboard_markup, map_request_error};
pub use error::{TelegramError, TelegramResult};
