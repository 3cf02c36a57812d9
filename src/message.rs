use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type MessageId = i64;

/// A stored message between two participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Message {
    /// The participant on the other side of the conversation from `user_id`
    pub fn counterparty_of(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.receiver_id
        } else {
            &self.sender_id
        }
    }
}

/// Derived per-counterparty row, recomputed on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub counterparty_id: String,
    pub counterparty_display_name: String,
    pub counterparty_avatar: Option<String>,
    pub last_message: Message,
    pub unread_count: u64,
    pub unread: bool,
}

/// Frames a client sends over its live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Subscribe { user_id: String },
    #[serde(rename_all = "camelCase")]
    Send { receiver_id: String, text: String },
    #[serde(rename_all = "camelCase")]
    MarkRead { counterparty_id: String },
}

/// Frames the server pushes to a live connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Subscribed {
        user_id: String,
        poll_interval_ms: u64,
    },
    Message { message: Message },
    #[serde(rename_all = "camelCase")]
    Ack { message_id: MessageId },
    #[serde(rename_all = "camelCase")]
    ReadUpdated {
        counterparty_id: String,
        updated: u64,
    },
    Error { code: String, message: String },
}
