use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::{validate_new_message, validate_user_id, MessageStore};
use crate::error::AppResult;
use crate::message::{Message, MessageId};
use crate::utils::conversation_key;

type ConversationLog = Arc<Mutex<Vec<Message>>>;

/// Process-local message store.
///
/// Each conversation has its own mutex, so appends to one pair never wait on
/// another pair. Ids come from a shared counter but are taken while holding the
/// conversation lock, which keeps them increasing within a conversation.
pub struct InMemoryMessageStore {
    next_id: AtomicI64,
    conversations: RwLock<HashMap<String, ConversationLog>>,
    /// user id -> conversation keys the user takes part in
    by_user: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            conversations: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
        }
    }

    async fn existing(&self, key: &str) -> Option<ConversationLog> {
        self.conversations.read().await.get(key).cloned()
    }

    async fn get_or_create(&self, key: &str, user_a: &str, user_b: &str) -> ConversationLog {
        if let Some(log) = self.existing(key).await {
            return log;
        }

        let log = {
            let mut conversations = self.conversations.write().await;
            conversations
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
                .clone()
        };

        let mut by_user = self.by_user.write().await;
        for user in [user_a, user_b] {
            by_user
                .entry(user.to_string())
                .or_default()
                .insert(key.to_string());
        }

        log
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, sender_id: &str, receiver_id: &str, text: &str) -> AppResult<Message> {
        let text = validate_new_message(sender_id, receiver_id, text)?;
        let key = conversation_key(sender_id, receiver_id);
        let conversation = self.get_or_create(&key, sender_id, receiver_id).await;

        let mut log = conversation.lock().await;

        // Never step back in time inside a conversation, even if the clock does
        let now = Utc::now();
        let created_at = match log.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text,
            created_at,
            read: false,
        };
        log.push(message.clone());

        Ok(message)
    }

    async fn list_between(
        &self,
        user_a: &str,
        user_b: &str,
        since_id: Option<MessageId>,
    ) -> AppResult<Vec<Message>> {
        validate_user_id(user_a, "userA")?;
        validate_user_id(user_b, "userB")?;

        let Some(conversation) = self.existing(&conversation_key(user_a, user_b)).await else {
            return Ok(Vec::new());
        };

        let log = conversation.lock().await;
        Ok(log
            .iter()
            .filter(|m| {
                (m.sender_id == user_a && m.receiver_id == user_b)
                    || (m.sender_id == user_b && m.receiver_id == user_a)
            })
            .filter(|m| since_id.map_or(true, |since| m.id > since))
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Message>> {
        validate_user_id(user_id, "userId")?;

        let keys = match self.by_user.read().await.get(user_id) {
            Some(keys) => keys.clone(),
            None => return Ok(Vec::new()),
        };

        let mut feed = Vec::new();
        for key in keys {
            if let Some(conversation) = self.existing(&key).await {
                feed.extend(conversation.lock().await.iter().cloned());
            }
        }

        feed.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(feed)
    }

    async fn mark_read(&self, reader_id: &str, counterparty_id: &str) -> AppResult<u64> {
        validate_user_id(reader_id, "readerId")?;
        validate_user_id(counterparty_id, "counterpartyId")?;

        let Some(conversation) = self
            .existing(&conversation_key(reader_id, counterparty_id))
            .await
        else {
            return Ok(0);
        };

        let mut log = conversation.lock().await;
        let mut updated = 0;
        for message in log
            .iter_mut()
            .filter(|m| m.receiver_id == reader_id && m.sender_id == counterparty_id && !m.read)
        {
            message.read = true;
            updated += 1;
        }

        Ok(updated)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
