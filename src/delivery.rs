// ============================================================================
// Delivery Gateway
// ============================================================================
//
// Boundary for every client-facing messaging operation. HTTP routes and the
// WebSocket loop both go through here so a message takes the same path
// regardless of transport:
//
//   append -> publish(receiver) + publish(sender) -> notify (spawned)
//
// Only the append can fail a send. Live fan-out and pushes are best-effort.
//
// ============================================================================

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::LoggingConfig;
use crate::conversations::ConversationAggregator;
use crate::directory::{UserDirectory, UserProfile};
use crate::error::{AppError, AppResult};
use crate::message::{ConversationSummary, Message, MessageId, ServerMessage};
use crate::metrics;
use crate::notifications::NotificationDispatcher;
use crate::realtime::RealtimeChannel;
use crate::store::{validate_user_id, MessageStore};

pub struct DeliveryGateway {
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    realtime: Arc<RealtimeChannel>,
    notifications: Arc<NotificationDispatcher>,
    logging: LoggingConfig,
}

impl DeliveryGateway {
    pub fn new(
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        realtime: Arc<RealtimeChannel>,
        notifications: Arc<NotificationDispatcher>,
        logging: LoggingConfig,
    ) -> Self {
        Self {
            store,
            directory,
            realtime,
            notifications,
            logging,
        }
    }

    /// Persist and deliver a message. Returns as soon as the append succeeds.
    pub async fn send(&self, sender_id: &str, receiver_id: &str, text: &str) -> AppResult<Message> {
        let message = match self.store.append(sender_id, receiver_id, text).await {
            Ok(message) => message,
            Err(e) => {
                if matches!(e, AppError::Validation(_)) {
                    metrics::MESSAGES_REJECTED_TOTAL.inc();
                }
                return Err(e);
            }
        };
        metrics::MESSAGES_SENT_TOTAL.inc();

        let frame = ServerMessage::Message {
            message: message.clone(),
        };
        let to_receiver = self.realtime.publish(&message.receiver_id, &frame).await;
        let to_sender = self.realtime.publish(&message.sender_id, &frame).await;

        info!(
            message_id = message.id,
            sender = %self.logging.user_ref(&message.sender_id),
            receiver = %self.logging.user_ref(&message.receiver_id),
            live_receiver_connections = to_receiver,
            live_sender_connections = to_sender,
            "Message stored"
        );

        let notifications = Arc::clone(&self.notifications);
        let directory = Arc::clone(&self.directory);
        let stored = message.clone();
        tokio::spawn(async move {
            let sender = match directory.profile(&stored.sender_id).await {
                Ok(Some(profile)) => profile,
                Ok(None) => UserProfile::placeholder(&stored.sender_id),
                Err(e) => {
                    debug!(error = %e, "Sender profile lookup failed, using placeholder");
                    UserProfile::placeholder(&stored.sender_id)
                }
            };
            notifications
                .maybe_notify(
                    &stored.receiver_id,
                    &stored,
                    &sender.display_name,
                    sender.avatar.as_deref(),
                )
                .await;
        });

        Ok(message)
    }

    /// Messages between two users, oldest first; `since_id` for incremental polls
    pub async fn fetch(
        &self,
        user_id: &str,
        counterparty_id: &str,
        since_id: Option<MessageId>,
    ) -> AppResult<Vec<Message>> {
        validate_user_id(user_id, "userId")?;
        validate_user_id(counterparty_id, "counterpartyId")?;
        metrics::POLL_REQUESTS_TOTAL.inc();

        self.store.list_between(user_id, counterparty_id, since_id).await
    }

    pub async fn conversations(&self, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
        validate_user_id(user_id, "userId")?;
        ConversationAggregator::summarize(self.store.as_ref(), self.directory.as_ref(), user_id)
            .await
    }

    /// Receiver's explicit read action for one conversation
    pub async fn mark_read(&self, reader_id: &str, counterparty_id: &str) -> AppResult<u64> {
        validate_user_id(reader_id, "userId")?;
        validate_user_id(counterparty_id, "counterpartyId")?;

        let updated = self.store.mark_read(reader_id, counterparty_id).await?;
        debug!(
            reader = %self.logging.user_ref(reader_id),
            updated,
            "Conversation marked read"
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::notifications::testing::RecordingPushClient;
    use crate::store::InMemoryMessageStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Harness {
        gateway: DeliveryGateway,
        realtime: Arc<RealtimeChannel>,
        directory: Arc<InMemoryDirectory>,
        push: Arc<RecordingPushClient>,
    }

    fn logging() -> LoggingConfig {
        LoggingConfig {
            enable_user_identifiers: false,
            hash_salt: "test-salt".to_string(),
        }
    }

    fn harness_with_store(store: Arc<dyn MessageStore>) -> Harness {
        let realtime = Arc::new(RealtimeChannel::new(16));
        let directory = Arc::new(InMemoryDirectory::new());
        let push = Arc::new(RecordingPushClient::default());
        let notifications = Arc::new(NotificationDispatcher::new(
            realtime.clone(),
            directory.clone(),
            push.clone(),
            logging(),
        ));
        let gateway = DeliveryGateway::new(
            store,
            directory.clone(),
            realtime.clone(),
            notifications,
            logging(),
        );
        Harness {
            gateway,
            realtime,
            directory,
            push,
        }
    }

    fn harness() -> Harness {
        harness_with_store(Arc::new(InMemoryMessageStore::new()))
    }

    async fn wait_for_pushes(push: &RecordingPushClient, expected: usize) {
        for _ in 0..100 {
            if push.count().await >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn append(&self, _: &str, _: &str, _: &str) -> AppResult<Message> {
            Err(AppError::storage("database is down"))
        }
        async fn list_between(
            &self,
            _: &str,
            _: &str,
            _: Option<MessageId>,
        ) -> AppResult<Vec<Message>> {
            Err(AppError::storage("database is down"))
        }
        async fn list_for_user(&self, _: &str) -> AppResult<Vec<Message>> {
            Err(AppError::storage("database is down"))
        }
        async fn mark_read(&self, _: &str, _: &str) -> AppResult<u64> {
            Err(AppError::storage("database is down"))
        }
        async fn ping(&self) -> AppResult<()> {
            Err(AppError::storage("database is down"))
        }
    }

    #[tokio::test]
    async fn test_two_party_exchange_and_summaries() {
        let h = harness();
        h.directory.upsert_profile("A", "Alex", None).await.unwrap();
        h.directory.upsert_profile("B", "Blue Cafe", None).await.unwrap();

        h.gateway.send("A", "B", "Hi").await.unwrap();
        h.gateway.send("B", "A", "Are you there?").await.unwrap();

        let thread = h.gateway.fetch("A", "B", None).await.unwrap();
        let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Hi", "Are you there?"]);
        assert_eq!(h.gateway.fetch("B", "A", None).await.unwrap(), thread);

        let for_a = h.gateway.conversations("A").await.unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].counterparty_id, "B");
        assert_eq!(for_a[0].counterparty_display_name, "Blue Cafe");
        assert_eq!(for_a[0].last_message.text, "Are you there?");
        assert_eq!(for_a[0].unread_count, 1);

        let for_b = h.gateway.conversations("B").await.unwrap();
        assert_eq!(for_b[0].counterparty_id, "A");
        assert!(for_b[0].unread);
        assert_eq!(for_b[0].last_message.text, "Are you there?");
    }

    #[tokio::test]
    async fn test_two_messages_from_one_sender() {
        let h = harness();

        h.gateway.send("A", "B", "Hi").await.unwrap();
        h.gateway.send("A", "B", "Are you there?").await.unwrap();

        let thread = h.gateway.fetch("A", "B", None).await.unwrap();
        let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Hi", "Are you there?"]);

        let for_a = h.gateway.conversations("A").await.unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].counterparty_id, "B");
        assert_eq!(for_a[0].last_message.text, "Are you there?");
        assert!(!for_a[0].unread);

        let for_b = h.gateway.conversations("B").await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].counterparty_id, "A");
        assert_eq!(for_b[0].last_message.text, "Are you there?");
        assert!(for_b[0].unread);
        assert_eq!(for_b[0].unread_count, 2);
    }

    #[tokio::test]
    async fn test_self_message_is_validation_error() {
        let h = harness();
        let err = h.gateway.send("A", "A", "test").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(h.gateway.conversations("A").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_since_last_seen_id() {
        let h = harness();
        let first = h.gateway.send("A", "B", "one").await.unwrap();
        let second = h.gateway.send("B", "A", "two").await.unwrap();

        let newer = h.gateway.fetch("A", "B", Some(first.id)).await.unwrap();
        assert_eq!(newer, vec![second.clone()]);
        assert!(h.gateway.fetch("A", "B", Some(second.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_publishes_to_receiver_and_sender() {
        let h = harness();
        let mut receiver = h.realtime.subscribe("B").await;
        let mut sender_other_device = h.realtime.subscribe("A").await;

        let message = h.gateway.send("A", "B", "Hello").await.unwrap();
        let expected = ServerMessage::Message { message };

        assert_eq!(receiver.receiver.recv().await, Some(expected.clone()));
        assert_eq!(sender_other_device.receiver.recv().await, Some(expected));
    }

    #[tokio::test]
    async fn test_offline_receiver_gets_exactly_one_push() {
        let h = harness();
        h.directory.upsert_profile("A", "Alex", Some("https://cdn.example/a.png")).await.unwrap();
        h.directory.set_device_token("B", Some("token-b")).await.unwrap();

        h.gateway.send("A", "B", "Shift starts at 9").await.unwrap();
        wait_for_pushes(&h.push, 1).await;

        let sent = h.push.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "New message from Alex");
        assert_eq!(sent[0].data.counterparty_id, "A");
        assert_eq!(sent[0].data.counterparty_avatar.as_deref(), Some("https://cdn.example/a.png"));
    }

    #[tokio::test]
    async fn test_live_receiver_gets_no_push() {
        let h = harness();
        h.directory.set_device_token("B", Some("token-b")).await.unwrap();
        let _live = h.realtime.subscribe("B").await;

        h.gateway.send("A", "B", "Hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.push.count().await, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_send_without_side_effects() {
        let h = harness_with_store(Arc::new(FailingStore));
        h.directory.set_device_token("B", Some("token-b")).await.unwrap();
        let mut live = h.realtime.subscribe("B").await;

        let err = h.gateway.send("A", "B", "Hello").await.unwrap_err();
        assert!(err.is_storage());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(live.receiver.try_recv().is_err());
        assert_eq!(h.push.count().await, 0);
    }

    #[tokio::test]
    async fn test_mark_read_clears_unread() {
        let h = harness();
        h.gateway.send("B", "A", "one").await.unwrap();
        h.gateway.send("B", "A", "two").await.unwrap();

        assert_eq!(h.gateway.mark_read("A", "B").await.unwrap(), 2);
        assert_eq!(h.gateway.mark_read("A", "B").await.unwrap(), 0);

        let for_a = h.gateway.conversations("A").await.unwrap();
        assert_eq!(for_a[0].unread_count, 0);
        assert!(!for_a[0].unread);
    }
}
