#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_core::{
    ApiError, ApiResult, ChatApi, ChatTarget, DispatchEngine, InlineKeyboard, MediaKind,
    MediaUpload, MessageId, MessageOwners, MessageRef,
};

/// A call observed by [`MockApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendText { chat: ChatTarget, text: String },
    EditText { message: MessageRef, text: String },
    SendPhoto { chat: ChatTarget, data: Vec<u8> },
    SendVideo { chat: ChatTarget, data: Vec<u8> },
    SendAnimation { chat: ChatTarget, data: Vec<u8> },
    EditMedia { message: MessageRef, kind: MediaKind, data: Vec<u8> },
}

impl Call {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send_text",
            Self::EditText { .. } => "edit_text",
            Self::SendPhoto { .. } => "send_photo",
            Self::SendVideo { .. } => "send_video",
            Self::SendAnimation { .. } => "send_animation",
            Self::EditMedia { .. } => "edit_media",
        }
    }
}

/// A mock ChatApi that records every call and fails on demand.
///
/// Scripted failures (`fail_next`) are consumed first; a standing failure
/// (`always_fail`) applies once the script for that operation is empty.
pub struct MockApi {
    calls: Mutex<Vec<Call>>,
    scripted: Mutex<HashMap<&'static str, VecDeque<ApiError>>>,
    standing: Mutex<HashMap<&'static str, ApiError>>,
    next_id: AtomicI32,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            scripted: Mutex::new(HashMap::new()),
            standing: Mutex::new(HashMap::new()),
            next_id: AtomicI32::new(100),
        })
    }

    pub fn fail_next(&self, operation: &'static str, error: ApiError) {
        self.scripted
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn always_fail(&self, operation: &'static str, error: ApiError) {
        self.standing.lock().unwrap().insert(operation, error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls().iter().map(Call::operation).collect()
    }

    fn respond(&self, call: Call) -> ApiResult<MessageId> {
        let operation = call.operation();
        self.calls.lock().unwrap().push(call);

        if let Some(error) = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        if let Some(error) = self.standing.lock().unwrap().get(operation) {
            return Err(error.clone());
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn send_text(
        &self,
        chat: &ChatTarget,
        text: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.respond(Call::SendText {
            chat: chat.clone(),
            text: text.to_string(),
        })
    }

    async fn edit_text(
        &self,
        message: &MessageRef,
        text: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.respond(Call::EditText {
            message: message.clone(),
            text: text.to_string(),
        })
        .map(|_| message.message_id)
    }

    async fn send_photo(
        &self,
        chat: &ChatTarget,
        photo: MediaUpload,
        _caption: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.respond(Call::SendPhoto {
            chat: chat.clone(),
            data: photo.data,
        })
    }

    async fn send_video(
        &self,
        chat: &ChatTarget,
        video: MediaUpload,
        _caption: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.respond(Call::SendVideo {
            chat: chat.clone(),
            data: video.data,
        })
    }

    async fn send_animation(
        &self,
        chat: &ChatTarget,
        animation: MediaUpload,
        _caption: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.respond(Call::SendAnimation {
            chat: chat.clone(),
            data: animation.data,
        })
    }

    async fn edit_media(
        &self,
        message: &MessageRef,
        media: MediaUpload,
        _caption: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> ApiResult<MessageId> {
        self.respond(Call::EditMedia {
            message: message.clone(),
            kind: media.kind,
            data: media.data,
        })
        .map(|_| message.message_id)
    }
}

/// Engine over `api` with an in-memory ownership registry.
pub fn engine(api: &Arc<MockApi>, max_retries: u32) -> (DispatchEngine, Arc<MessageOwners>) {
    let owners = Arc::new(MessageOwners::new());
    let engine = DispatchEngine::new(api.clone(), owners.clone(), max_retries);
    (engine, owners)
}
