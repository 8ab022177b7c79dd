use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// A single text in a conversation. Created once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationKey,
    pub body: String,
    pub from: String,
    /// Unix timestamp in milliseconds.
    pub sent_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationKey,
    pub from: String,
    pub body: String,
}

impl NewMessage {
    /// Assigns a fresh id and stamps the message with `sent_at`.
    pub fn into_message(self, sent_at: i64) -> Message {
        Message {
            id: MessageId::generate(),
            conversation_id: self.conversation_id,
            body: self.body,
            from: self.from,
            sent_at,
        }
    }
}
