//! Admission control for outbound calls.
//!
//! [`RateWindow`] is a single sliding-window gate. [`CompositeLimiter`] stacks
//! a server-imposed cooldown, a per-chat window, a global window and a
//! minimum pacing delay, in that order.

mod composite;
mod window;

pub use composite::{CompositeLimiter, RETRY_AFTER_BUFFER};
pub use window::RateWindow;
