use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform message identifier.
pub type MessageId = i32;

/// Identity of the user a message (and its keyboard) belongs to.
pub type OwnerId = i64;

/// A conversation messages are delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    /// Numeric chat id. Negative ids are groups, supergroups and channels.
    Id(i64),
    /// Public `@username` of a channel or supergroup.
    Username(String),
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
        }
    }
}

impl From<i64> for ChatTarget {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid chat target {0:?}: expected a numeric id or @username")]
pub struct ParseTargetError(String);

impl FromStr for ChatTarget {
    type Err = ParseTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(name) = trimmed.strip_prefix('@') {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ParseTargetError(s.to_string()));
            }
            return Ok(Self::Username(name.to_string()));
        }
        trimmed
            .parse::<i64>()
            .map(Self::Id)
            .map_err(|_| ParseTargetError(s.to_string()))
    }
}

/// An existing message in a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat: ChatTarget,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(chat: ChatTarget, message_id: MessageId) -> Self {
        Self { chat, message_id }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat, self.message_id)
    }
}

/// Inline keyboard attached to a message. Built by callers, passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// Appends a row of buttons.
    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        self.rows.push(buttons);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    pub action: ButtonAction,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

/// How a media payload is presented by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
}

impl MediaKind {
    /// Classifies a file name by its extension. Anything unrecognised is a photo.
    pub fn from_file_name(name: &str) -> Self {
        let extension = std::path::Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("gif") => Self::Animation,
            Some("mp4" | "webm") => Self::Video,
            _ => Self::Photo,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Animation => "animation",
        };
        f.write_str(name)
    }
}

/// Bytes read from a payload, ready to hand to the chat API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub kind: MediaKind,
    pub file_name: String,
    pub data: Vec<u8>,
}
