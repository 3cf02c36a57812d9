// ============================================================================
// Message Store
// ============================================================================
//
// Append-only record of two-party messages; the single source of truth for
// polling, conversation summaries and live fan-out.
//
// Implementations:
// - PostgresMessageStore: durable, per-conversation advisory lock on append
// - InMemoryMessageStore: per-conversation mutex buckets (development, tests)
//
// ============================================================================

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::config::MAX_MESSAGE_TEXT_CHARS;
use crate::error::{AppError, AppResult};
use crate::message::{Message, MessageId};

pub use memory::InMemoryMessageStore;
pub use postgres::PostgresMessageStore;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message and assign its id and timestamp.
    ///
    /// Fails with `AppError::Validation` before any write when the trimmed text
    /// is empty or too long, or when sender and receiver are the same user.
    async fn append(&self, sender_id: &str, receiver_id: &str, text: &str) -> AppResult<Message>;

    /// All messages between two users, oldest first (ties by id).
    /// With `since_id`, only messages strictly after that message.
    async fn list_between(
        &self,
        user_a: &str,
        user_b: &str,
        since_id: Option<MessageId>,
    ) -> AppResult<Vec<Message>>;

    /// Every message the user sent or received, newest first
    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Message>>;

    /// Flag everything `counterparty_id` sent to `reader_id` as read.
    /// Returns the number of messages that changed.
    async fn mark_read(&self, reader_id: &str, counterparty_id: &str) -> AppResult<u64>;

    /// Check that the backing storage is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// Validates a send request and returns the text as it will be stored
pub fn validate_new_message(sender_id: &str, receiver_id: &str, text: &str) -> AppResult<String> {
    validate_user_id(sender_id, "senderId")?;
    validate_user_id(receiver_id, "receiverId")?;

    if sender_id == receiver_id {
        return Err(AppError::validation("Cannot send a message to yourself"));
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Message text cannot be empty"));
    }

    if trimmed.chars().count() > MAX_MESSAGE_TEXT_CHARS {
        return Err(AppError::Validation(format!(
            "Message text exceeds maximum of {} characters",
            MAX_MESSAGE_TEXT_CHARS
        )));
    }

    Ok(trimmed.to_string())
}

pub fn validate_user_id(user_id: &str, field: &str) -> AppResult<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(())
}
