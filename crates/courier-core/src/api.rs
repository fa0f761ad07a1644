use async_trait::async_trait;

use crate::error::ApiResult;
use crate::types::{ChatTarget, InlineKeyboard, MediaUpload, MessageId, MessageRef};

/// The remote chat platform, reduced to the primitives delivery needs.
///
/// Production code uses the Telegram implementation from `courier-telegram`;
/// tests provide recording mocks. Implementations map every platform failure
/// onto [`ApiError`](crate::error::ApiError) and do no retrying of their own.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a text message. Returns the id of the new message.
    async fn send_text(
        &self,
        chat: &ChatTarget,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId>;

    /// Replace the text (and keyboard) of an existing message.
    async fn edit_text(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId>;

    async fn send_photo(
        &self,
        chat: &ChatTarget,
        photo: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId>;

    async fn send_video(
        &self,
        chat: &ChatTarget,
        video: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId>;

    async fn send_animation(
        &self,
        chat: &ChatTarget,
        animation: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId>;

    /// Replace the media of an existing message in place, using `media.kind`.
    ///
    /// Fails with [`ApiError::EditUnsupported`](crate::error::ApiError::EditUnsupported)
    /// when the platform refuses to turn the message into this kind of media.
    async fn edit_media(
        &self,
        message: &MessageRef,
        media: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId>;
}
