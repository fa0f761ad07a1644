use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    ApiError, ApiResult, ButtonAction, ChatApi, ChatTarget, CourierConfig, InlineKeyboard,
    MediaKind, MediaUpload, MessageId, MessageRef,
};
use teloxide::payloads::{
    EditMessageMediaSetters, EditMessageTextSetters, SendAnimationSetters, SendMessageSetters,
    SendPhotoSetters, SendVideoSetters,
};
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaAnimation,
    InputMediaPhoto, InputMediaVideo, ParseMode, Recipient,
};
use teloxide::{ApiError as TgApiError, RequestError};
use tracing::debug;

use crate::error::{TelegramError, TelegramResult};

/// [`ChatApi`] backed by the Telegram Bot API.
///
/// Every call is a single request; retries and pacing belong to the engine.
/// Text and captions are sent with HTML parse mode.
pub struct TelegramApi {
    bot: teloxide::Bot,
}

impl TelegramApi {
    /// Create a new TelegramApi from a bot token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: teloxide::Bot::new(token),
        }
    }

    /// Create a TelegramApi from the configured or environment token.
    pub fn from_config(config: &CourierConfig) -> TelegramResult<Self> {
        let token = config
            .resolve_token()
            .ok_or(TelegramError::MissingBotToken)?;
        Ok(Self::new(&token))
    }

    async fn send_media(
        &self,
        chat: &ChatTarget,
        upload: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        let markup = keyboard.map(keyboard_markup).transpose().map_err(fatal)?;
        let recipient = recipient(chat);
        let kind = upload.kind;
        let file = input_file(upload);

        let sent = match kind {
            MediaKind::Photo => {
                let mut request = self.bot.send_photo(recipient, file);
                if !caption.is_empty() {
                    request = request.caption(caption).parse_mode(ParseMode::Html);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await
            }
            MediaKind::Video => {
                let mut request = self.bot.send_video(recipient, file);
                if !caption.is_empty() {
                    request = request.caption(caption).parse_mode(ParseMode::Html);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await
            }
            MediaKind::Animation => {
                let mut request = self.bot.send_animation(recipient, file);
                if !caption.is_empty() {
                    request = request.caption(caption).parse_mode(ParseMode::Html);
                }
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await
            }
        };

        let sent = sent.map_err(map_request_error)?;
        debug!(chat = %chat, kind = %kind, message_id = sent.id.0, "Sent media");
        Ok(sent.id.0)
    }
}

#[async_trait]
impl ChatApi for TelegramApi {
    async fn send_text(
        &self,
        chat: &ChatTarget,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        let markup = keyboard.map(keyboard_markup).transpose().map_err(fatal)?;
        let mut request = self
            .bot
            .send_message(recipient(chat), text)
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }

        let sent = request.await.map_err(map_request_error)?;
        Ok(sent.id.0)
    }

    async fn edit_text(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        let markup = keyboard.map(keyboard_markup).transpose().map_err(fatal)?;
        let mut request = self
            .bot
            .edit_message_text(
                recipient(&message.chat),
                teloxide::types::MessageId(message.message_id),
                text,
            )
            .parse_mode(ParseMode::Html);
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }

        match request.await {
            Ok(_) | Err(RequestError::Api(TgApiError::MessageNotModified)) => {
                Ok(message.message_id)
            }
            Err(e) => Err(map_request_error(e)),
        }
    }

    async fn send_photo(
        &self,
        chat: &ChatTarget,
        upload: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.send_media(chat, upload, caption, keyboard).await
    }

    async fn send_video(
        &self,
        chat: &ChatTarget,
        upload: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.send_media(chat, upload, caption, keyboard).await
    }

    async fn send_animation(
        &self,
        chat: &ChatTarget,
        upload: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.send_media(chat, upload, caption, keyboard).await
    }

    async fn edit_media(
        &self,
        message: &MessageRef,
        upload: MediaUpload,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        let markup = keyboard.map(keyboard_markup).transpose().map_err(fatal)?;
        let media = input_media(upload, caption);
        let mut request = self.bot.edit_message_media(
            recipient(&message.chat),
            teloxide::types::MessageId(message.message_id),
            media,
        );
        if let Some(markup) = markup {
            request = request.reply_markup(markup);
        }

        match request.await {
            Ok(_) | Err(RequestError::Api(TgApiError::MessageNotModified)) => {
                Ok(message.message_id)
            }
            Err(e) => Err(map_request_error(e)),
        }
    }
}

/// Translate a Telegram request failure into the engine's taxonomy.
pub fn map_request_error(error: RequestError) -> ApiError {
    match error {
        RequestError::RetryAfter(wait) => ApiError::RateLimited {
            retry_after: Duration::from_secs(u64::from(wait.seconds())),
        },
        RequestError::Network(e) => ApiError::Network(e.to_string()),
        RequestError::Io(e) => ApiError::Network(e.to_string()),
        RequestError::Api(api) => classify_api_error(api),
        other => ApiError::Fatal(other.to_string()),
    }
}

fn classify_api_error(api: TgApiError) -> ApiError {
    match api {
        TgApiError::MessageCantBeEdited | TgApiError::MessageToEditNotFound => {
            ApiError::EditUnsupported(api.to_string())
        }
        TgApiError::Unknown(description) if refuses_edit(&description) => {
            ApiError::EditUnsupported(description)
        }
        other => ApiError::Fatal(other.to_string()),
    }
}

fn refuses_edit(description: &str) -> bool {
    let lowered = description.to_lowercase();
    lowered.contains("can't be edited") || lowered.contains("no media")
}

fn fatal(error: TelegramError) -> ApiError {
    ApiError::Fatal(error.to_string())
}

fn recipient(chat: &ChatTarget) -> Recipient {
    match chat {
        ChatTarget::Id(id) => Recipient::Id(ChatId(*id)),
        ChatTarget::Username(name) => Recipient::ChannelUsername(format!("@{name}")),
    }
}

fn input_file(upload: MediaUpload) -> InputFile {
    InputFile::memory(upload.data).file_name(upload.file_name)
}

fn input_media(upload: MediaUpload, caption: &str) -> InputMedia {
    let kind = upload.kind;
    let file = input_file(upload);
    match kind {
        MediaKind::Photo => {
            let mut media = InputMediaPhoto::new(file);
            if !caption.is_empty() {
                media = media.caption(caption).parse_mode(ParseMode::Html);
            }
            InputMedia::Photo(media)
        }
        MediaKind::Video => {
            let mut media = InputMediaVideo::new(file);
            if !caption.is_empty() {
                media = media.caption(caption).parse_mode(ParseMode::Html);
            }
            InputMedia::Video(media)
        }
        MediaKind::Animation => {
            let mut media = InputMediaAnimation::new(file);
            if !caption.is_empty() {
                media = media.caption(caption).parse_mode(ParseMode::Html);
            }
            InputMedia::Animation(media)
        }
    }
}

/// Convert a platform-neutral keyboard into Telegram's inline markup.
pub fn keyboard_markup(keyboard: &InlineKeyboard) -> TelegramResult<InlineKeyboardMarkup> {
    let mut rows = Vec::with_capacity(keyboard.rows.len());
    for row in &keyboard.rows {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            let converted = match &button.action {
                ButtonAction::Callback(data) => {
                    InlineKeyboardButton::callback(button.text.clone(), data.clone())
                }
                ButtonAction::Url(url) => {
                    let parsed =
                        reqwest::Url::parse(url).map_err(|e| TelegramError::InvalidButtonUrl {
                            url: url.clone(),
                            reason: e.to_string(),
                        })?;
                    InlineKeyboardButton::url(button.text.clone(), parsed)
                }
            };
            buttons.push(converted);
        }
        rows.push(buttons);
    }
    Ok(InlineKeyboardMarkup::new(rows))
}

/// Escape special HTML characters for Telegram's HTML parse mode.
///
/// Telegram requires `<`, `>`, and `&` to be escaped in HTML-formatted messages.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Disposition, InlineButton};
    use teloxide::types::{InlineKeyboardButtonKind, Seconds};

    #[test]
    fn test_retry_after_maps_to_rate_limited() {
        let error = map_request_error(RequestError::RetryAfter(Seconds::from_seconds(7)));
        assert_eq!(
            error,
            ApiError::RateLimited {
                retry_after: Duration::from_secs(7)
            }
        );
    }

    #[test]
    fn test_refused_edits_map_to_fallback() {
        for api in [
            TgApiError::MessageCantBeEdited,
            TgApiError::MessageToEditNotFound,
            TgApiError::Unknown("Bad Request: there is no media in the message to edit".into()),
            TgApiError::Unknown("Bad Request: message can't be edited".into()),
        ] {
            let error = map_request_error(RequestError::Api(api));
            assert_eq!(error.disposition(), Disposition::EditFallback, "{error}");
        }
    }

    #[test]
    fn test_other_api_errors_are_fatal() {
        let error = map_request_error(RequestError::Api(TgApiError::BotBlocked));
        assert_eq!(error.disposition(), Disposition::Fatal);

        let error = map_request_error(RequestError::Api(TgApiError::Unknown(
            "Bad Request: chat not found".into(),
        )));
        assert_eq!(error.disposition(), Disposition::Fatal);
    }

    #[test]
    fn test_migrated_chat_is_fatal() {
        let error = map_request_error(RequestError::MigrateToChatId(ChatId(-100_200)));
        assert_eq!(error.disposition(), Disposition::Fatal);
    }

    #[test]
    fn test_recipient_for_username_has_at_prefix() {
        match recipient(&ChatTarget::Username("news".into())) {
            Recipient::ChannelUsername(name) => assert_eq!(name, "@news"),
            Recipient::Id(id) => panic!("expected username, got {id}"),
        }
        assert!(matches!(
            recipient(&ChatTarget::Id(-42)),
            Recipient::Id(ChatId(-42))
        ));
    }

    #[test]
    fn test_keyboard_markup_preserves_layout() {
        let keyboard = InlineKeyboard::default()
            .row(vec![
                InlineButton::callback("Claim", "claim:1"),
                InlineButton::callback("Skip", "skip:1"),
            ])
            .row(vec![InlineButton::url("Rules", "https://example.com/rules")]);

        let markup = keyboard_markup(&keyboard).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[0][1].text, "Skip");
        assert!(matches!(
            &markup.inline_keyboard[0][0].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "claim:1"
        ));
        assert!(matches!(
            &markup.inline_keyboard[1][0].kind,
            InlineKeyboardButtonKind::Url(url) if url.as_str() == "https://example.com/rules"
        ));
    }

    #[test]
    fn test_keyboard_markup_rejects_bad_url() {
        let keyboard = InlineKeyboard::default().row(vec![InlineButton::url("Broken", "not a url")]);
        assert!(matches!(
            keyboard_markup(&keyboard),
            Err(TelegramError::InvalidButtonUrl { .. })
        ));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>A & B</b>"), "&lt;b&gt;A &amp; B&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
