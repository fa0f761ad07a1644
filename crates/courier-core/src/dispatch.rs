//! Delivery of text and media updates with retries and fallbacks.
//!
//! Every remote call goes through [`DispatchEngine::call_with_retries`], which
//! keeps two separate loops:
//!
//! - **cooling down**: the server answered with a retry-after. The wait is
//!   registered on the shared limiter and the call is repeated, as often as
//!   the server asks. It never touches the retry budget.
//! - **retrying**: a transient network failure. Retried with exponential
//!   backoff until `max_retries` is spent, then surfaced.
//!
//! Edit rejections are not retried in place; they bubble up one level where
//! the engine sends a fresh message instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::ChatApi;
use crate::error::{ApiError, ApiResult, DeliveryError, DeliveryResult, Disposition};
use crate::limiter::CompositeLimiter;
use crate::owners::OwnershipRecorder;
use crate::payload::Payload;
use crate::types::{
    ChatTarget, InlineKeyboard, MediaKind, MediaUpload, MessageId, MessageRef, OwnerId,
};

/// Backoff before the first network retry; doubles on every further retry.
pub const BASE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for a single network backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Shortest sleep after a retry-after, even if the server asked for less.
pub const MIN_COOLDOWN_SLEEP: Duration = Duration::from_millis(100);

/// Backoff before network retry number `attempt + 1`: `min(0.5s * 2^attempt, 5s)`.
pub fn backoff_delay(attempt: u32) -> Duration {
    BASE_RETRY_DELAY
        .saturating_mul(1_u32 << attempt.min(16))
        .min(MAX_RETRY_DELAY)
}

/// One update to deliver.
#[derive(Debug)]
pub struct DeliveryRequest {
    pub target: ChatTarget,
    pub caption: String,
    pub keyboard: Option<InlineKeyboard>,
    /// Media to attach. `None` or an empty payload sends text only.
    pub payload: Option<Payload>,
    /// Message to update in place. `None` always sends a new message.
    pub edit: Option<MessageId>,
    /// User the resulting message belongs to.
    pub owner: Option<OwnerId>,
}

impl DeliveryRequest {
    pub fn text(target: ChatTarget, caption: impl Into<String>) -> Self {
        Self {
            target,
            caption: caption.into(),
            keyboard: None,
            payload: None,
            edit: None,
            owner: None,
        }
    }

    pub fn media(target: ChatTarget, payload: Payload, caption: impl Into<String>) -> Self {
        Self {
            payload: Some(payload),
            ..Self::text(target, caption)
        }
    }

    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Prefer editing `message_id` over sending a new message.
    pub fn prefer_edit(mut self, message_id: MessageId) -> Self {
        self.edit = Some(message_id);
        self
    }

    pub fn owned_by(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// Why a call through the retry wrapper gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallFailure {
    /// Network failures outlasted the retry budget.
    Exhausted { attempts: u32, reason: String },
    /// Edit rejected; the caller decides whether to fall back.
    EditFallback(String),
    Fatal(String),
}

impl From<CallFailure> for DeliveryError {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Exhausted { attempts, reason } => Self::Network { attempts, reason },
            CallFailure::EditFallback(reason) | CallFailure::Fatal(reason) => Self::Api(reason),
        }
    }
}

/// What the retry loop does after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RetryState {
    /// Server-mandated wait. Unbounded, never counted.
    CoolingDown { wait: Duration },
    /// Transient failure within budget; back off, then try again.
    Retrying { delay: Duration },
    GiveUp(CallFailure),
}

impl RetryState {
    fn after(error: &ApiError, network_failures: u32, max_retries: u32) -> Self {
        match error.disposition() {
            Disposition::RateLimited(wait) => Self::CoolingDown { wait },
            Disposition::Retryable if network_failures < max_retries => Self::Retrying {
                delay: backoff_delay(network_failures),
            },
            Disposition::Retryable => Self::GiveUp(CallFailure::Exhausted {
                attempts: network_failures + 1,
                reason: error.to_string(),
            }),
            Disposition::EditFallback => Self::GiveUp(CallFailure::EditFallback(error.to_string())),
            Disposition::Fatal => Self::GiveUp(CallFailure::Fatal(error.to_string())),
        }
    }
}

/// Delivers updates to chats through a [`ChatApi`], gated by a shared
/// [`CompositeLimiter`].
pub struct DispatchEngine {
    api: Arc<dyn ChatApi>,
    recorder: Arc<dyn OwnershipRecorder>,
    max_retries: u32,
}

impl DispatchEngine {
    pub fn new(
        api: Arc<dyn ChatApi>,
        recorder: Arc<dyn OwnershipRecorder>,
        max_retries: u32,
    ) -> Self {
        Self {
            api,
            recorder,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delivers one update and records who owns the resulting message.
    ///
    /// Returns the message that now shows the update: the edited one, or a
    /// freshly sent one if the edit was refused.
    pub async fn deliver(
        &self,
        request: DeliveryRequest,
        limiter: &CompositeLimiter,
    ) -> DeliveryResult<MessageRef> {
        let DeliveryRequest {
            target,
            caption,
            keyboard,
            payload,
            edit,
            owner,
        } = request;

        let mut media = payload;
        if media.as_mut().is_some_and(Payload::is_empty) {
            media = None;
        }

        let message_id = match media {
            None => {
                self.deliver_text(&target, edit, &caption, keyboard.as_ref(), limiter)
                    .await?
            }
            Some(mut payload) => {
                self.deliver_media(
                    &target,
                    edit,
                    &mut payload,
                    &caption,
                    keyboard.as_ref(),
                    limiter,
                )
                .await?
            }
        };

        self.recorder.record(&target, message_id, owner);
        info!(chat = %target, message_id, "Delivered update");
        Ok(MessageRef::new(target, message_id))
    }

    async fn deliver_text(
        &self,
        target: &ChatTarget,
        edit: Option<MessageId>,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
        limiter: &CompositeLimiter,
    ) -> DeliveryResult<MessageId> {
        let api = &*self.api;

        if let Some(message_id) = edit {
            let message = MessageRef::new(target.clone(), message_id);
            let message = &message;
            match self
                .call_with_retries(target, "edit_text", limiter, move || {
                    api.edit_text(message, text, keyboard)
                })
                .await
            {
                Ok(id) => return Ok(id),
                Err(CallFailure::EditFallback(reason)) => {
                    warn!(
                        chat = %target,
                        message_id,
                        %reason,
                        "Text edit refused, sending new message"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        Ok(self
            .call_with_retries(target, "send_text", limiter, move || {
                api.send_text(target, text, keyboard)
            })
            .await?)
    }

    async fn deliver_media(
        &self,
        target: &ChatTarget,
        edit: Option<MessageId>,
        payload: &mut Payload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
        limiter: &CompositeLimiter,
    ) -> DeliveryResult<MessageId> {
        if let Some(message_id) = edit {
            let api = &*self.api;
            let message = MessageRef::new(target.clone(), message_id);
            let message = &message;
            let upload = payload.upload()?;
            match self
                .call_with_retries(target, "edit_media", limiter, move || {
                    api.edit_media(message, upload.clone(), caption, keyboard)
                })
                .await
            {
                Ok(id) => return Ok(id),
                Err(CallFailure::EditFallback(reason)) => {
                    warn!(
                        chat = %target,
                        message_id,
                        kind = %payload.kind(),
                        %reason,
                        "Media edit refused, sending new message"
                    );
                }
                Err(other) => return Err(other.into()),
            }
        }

        // Rewinds again: the failed edit may have consumed the payload.
        let upload = payload.upload()?;
        Ok(self.send_media(target, upload, caption, keyboard, limiter).await?)
    }

    async fn send_media(
        &self,
        target: &ChatTarget,
        upload: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
        limiter: &CompositeLimiter,
    ) -> Result<MessageId, CallFailure> {
        let api = &*self.api;
        match upload.kind {
            MediaKind::Animation => {
                self.call_with_retries(target, "send_animation", limiter, move || {
                    api.send_animation(target, upload.clone(), caption, keyboard)
                })
                .await
            }
            MediaKind::Video => {
                self.call_with_retries(target, "send_video", limiter, move || {
                    api.send_video(target, upload.clone(), caption, keyboard)
                })
                .await
            }
            MediaKind::Photo => {
                self.call_with_retries(target, "send_photo", limiter, move || {
                    api.send_photo(target, upload.clone(), caption, keyboard)
                })
                .await
            }
        }
    }

    /// Runs `call` until it succeeds, the retry budget is spent, or it fails
    /// for a reason retrying cannot fix.
    pub(crate) async fn call_with_retries<F, Fut>(
        &self,
        target: &ChatTarget,
        operation: &'static str,
        limiter: &CompositeLimiter,
        mut call: F,
    ) -> Result<MessageId, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<MessageId>>,
    {
        let mut network_failures: u32 = 0;
        let mut cooldowns: u32 = 0;

        loop {
            // Admission is bookkeeping only; it can delay a call but never fail it.
            limiter.acquire(Some(target)).await;

            let error = match call().await {
                Ok(message_id) => {
                    debug!(
                        operation,
                        chat = %target,
                        message_id,
                        network_failures,
                        cooldowns,
                        "Call succeeded"
                    );
                    return Ok(message_id);
                }
                Err(error) => error,
            };

            match RetryState::after(&error, network_failures, self.max_retries) {
                RetryState::CoolingDown { wait } => {
                    cooldowns += 1;
                    limiter.register_retry_after(wait).await;
                    warn!(
                        operation,
                        chat = %target,
                        wait_secs = wait.as_secs_f64(),
                        cooldowns,
                        "Rate limited by server, cooling down"
                    );
                    sleep(wait.max(MIN_COOLDOWN_SLEEP)).await;
                }
                RetryState::Retrying { delay } => {
                    network_failures += 1;
                    warn!(
                        operation,
                        chat = %target,
                        attempt = network_failures,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Network error, retrying"
                    );
                    sleep(delay).await;
                }
                RetryState::GiveUp(failure) => {
                    debug!(operation, chat = %target, ?failure, "Giving up on call");
                    return Err(failure);
                }
            }
        }
    }
}
