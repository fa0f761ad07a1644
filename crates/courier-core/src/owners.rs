use dashmap::DashMap;

use crate::types::{ChatTarget, MessageId, MessageRef, OwnerId};

/// Notified after every successful delivery, so keyboard presses can later be
/// checked against the user the message was built for.
pub trait OwnershipRecorder: Send + Sync {
    fn record(&self, chat: &ChatTarget, message_id: MessageId, owner: Option<OwnerId>);
}

/// In-memory message ownership, keyed by chat and message id.
#[derive(Debug, Default)]
pub struct MessageOwners {
    owners: DashMap<MessageRef, OwnerId>,
}

impl MessageOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner_of(&self, message: &MessageRef) -> Option<OwnerId> {
        self.owners.get(message).map(|owner| *owner)
    }

    /// Whether `user` may interact with `message`. Unowned messages are open to everyone.
    pub fn may_interact(&self, message: &MessageRef, user: OwnerId) -> bool {
        self.owner_of(message).is_none_or(|owner| owner == user)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

impl OwnershipRecorder for MessageOwners {
    fn record(&self, chat: &ChatTarget, message_id: MessageId, owner: Option<OwnerId>) {
        // Messages without an owner stay open to everyone.
        let Some(owner) = owner else { return };
        self.owners
            .insert(MessageRef::new(chat.clone(), message_id), owner);
    }
}
