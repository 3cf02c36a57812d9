// ============================================================================
// Realtime Channel
// ============================================================================
//
// Registry of live subscriptions keyed by user. A user may hold several
// connections (phone + tablet); each gets its own bounded outbound queue.
//
// Locking: the outer map is only write-locked to create or prune a user's
// bucket. Publishing to one user never blocks publishing to another.
//
// Delivery is at-most-once. A connection whose queue is full or closed is
// evicted; its client recovers by re-subscribing and polling from the last
// id it saw.
//
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::message::ServerMessage;
use crate::metrics;

pub type ConnectionId = Uuid;

type UserBucket = Mutex<HashMap<ConnectionId, mpsc::Sender<ServerMessage>>>;

/// Handle held by a live connection. Dropping it without `unsubscribe`
/// leaves a dead sender that the next publish evicts.
#[derive(Debug)]
pub struct Subscription {
    pub id: ConnectionId,
    pub user_id: String,
    pub receiver: mpsc::Receiver<ServerMessage>,
}

pub struct RealtimeChannel {
    buckets: RwLock<HashMap<String, Arc<UserBucket>>>,
    connection_buffer: usize,
}

impl RealtimeChannel {
    pub fn new(connection_buffer: usize) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            connection_buffer: connection_buffer.max(1),
        }
    }

    /// Register a new live connection for `user_id`
    pub async fn subscribe(&self, user_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.connection_buffer);
        let id = Uuid::new_v4();

        // Insert while holding the outer lock so a concurrent prune can't
        // drop the bucket between lookup and insert
        {
            let buckets = self.buckets.read().await;
            if let Some(bucket) = buckets.get(user_id) {
                bucket.lock().await.insert(id, tx);
                metrics::LIVE_SUBSCRIPTIONS.inc();
                return Subscription {
                    id,
                    user_id: user_id.to_string(),
                    receiver: rx,
                };
            }
        }

        let mut buckets = self.buckets.write().await;
        buckets
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())))
            .lock()
            .await
            .insert(id, tx);
        metrics::LIVE_SUBSCRIPTIONS.inc();

        Subscription {
            id,
            user_id: user_id.to_string(),
            receiver: rx,
        }
    }

    /// Remove a connection. Idempotent.
    pub async fn unsubscribe(&self, user_id: &str, id: ConnectionId) {
        let now_empty = {
            let buckets = self.buckets.read().await;
            let Some(bucket) = buckets.get(user_id) else {
                return;
            };
            let mut conns = bucket.lock().await;
            if conns.remove(&id).is_some() {
                metrics::LIVE_SUBSCRIPTIONS.dec();
            }
            conns.is_empty()
        };

        if now_empty {
            self.prune(user_id).await;
        }
    }

    /// Deliver `msg` to every live connection of `user_id`.
    /// Returns how many connections accepted it.
    pub async fn publish(&self, user_id: &str, msg: &ServerMessage) -> usize {
        let bucket = {
            let buckets = self.buckets.read().await;
            match buckets.get(user_id) {
                Some(bucket) => Arc::clone(bucket),
                None => return 0,
            }
        };

        let (delivered, now_empty) = {
            let mut conns = bucket.lock().await;
            let mut delivered = 0;
            conns.retain(|conn_id, tx| match tx.try_send(msg.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %conn_id,
                        "Evicting slow live connection (outbound queue full)"
                    );
                    metrics::SLOW_CONNECTIONS_EVICTED_TOTAL.inc();
                    metrics::LIVE_SUBSCRIPTIONS.dec();
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(connection_id = %conn_id, "Dropping closed live connection");
                    metrics::LIVE_SUBSCRIPTIONS.dec();
                    false
                }
            });
            (delivered, conns.is_empty())
        };

        if now_empty {
            self.prune(user_id).await;
        }

        delivered
    }

    /// Whether `user_id` currently has at least one live connection
    pub async fn has_subscribers(&self, user_id: &str) -> bool {
        let bucket = {
            let buckets = self.buckets.read().await;
            match buckets.get(user_id) {
                Some(bucket) => Arc::clone(bucket),
                None => return false,
            }
        };
        let conns = bucket.lock().await;
        conns.values().any(|tx| !tx.is_closed())
    }

    pub async fn connection_count(&self, user_id: &str) -> usize {
        let buckets = self.buckets.read().await;
        match buckets.get(user_id) {
            Some(bucket) => bucket.lock().await.len(),
            None => 0,
        }
    }

    /// Drop every subscription; connection loops see their queue close and exit
    pub async fn close_all(&self) {
        let mut buckets = self.buckets.write().await;
        let mut closed = 0usize;
        for (_, bucket) in buckets.drain() {
            let mut conns = bucket.lock().await;
            closed += conns.len();
            conns.clear();
        }
        metrics::LIVE_SUBSCRIPTIONS.sub(closed as i64);
        tracing::info!(connections = closed, "Closed all live subscriptions");
    }

    async fn prune(&self, user_id: &str) {
        let mut buckets = self.buckets.write().await;
        // Re-check: a subscribe may have landed after the read lock was released
        let empty = match buckets.get(user_id) {
            Some(bucket) => bucket.lock().await.is_empty(),
            None => false,
        };
        if empty {
            buckets.remove(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageId;

    fn ack(id: MessageId) -> ServerMessage {
        ServerMessage::Ack { message_id: id }
    }

    #[tokio::test]
    async fn test_publish_reaches_every_connection_of_user() {
        let channel = RealtimeChannel::new(8);
        let mut phone = channel.subscribe("worker-1").await;
        let mut tablet = channel.subscribe("worker-1").await;
        let mut other = channel.subscribe("biz-1").await;

        assert_eq!(channel.publish("worker-1", &ack(1)).await, 2);
        assert_eq!(phone.receiver.recv().await, Some(ack(1)));
        assert_eq!(tablet.receiver.recv().await, Some(ack(1)));
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let channel = RealtimeChannel::new(8);
        assert_eq!(channel.publish("nobody", &ack(1)).await, 0);
        assert!(!channel.has_subscribers("nobody").await);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_prunes() {
        let channel = RealtimeChannel::new(8);
        let sub = channel.subscribe("worker-1").await;
        assert!(channel.has_subscribers("worker-1").await);

        channel.unsubscribe("worker-1", sub.id).await;
        channel.unsubscribe("worker-1", sub.id).await;

        assert!(!channel.has_subscribers("worker-1").await);
        assert_eq!(channel.connection_count("worker-1").await, 0);
        assert_eq!(channel.publish("worker-1", &ack(1)).await, 0);
    }

    #[tokio::test]
    async fn test_full_queue_evicts_only_slow_connection() {
        let channel = RealtimeChannel::new(2);
        let slow = channel.subscribe("worker-1").await;
        let mut fast = channel.subscribe("worker-1").await;

        for id in 1..=2 {
            assert_eq!(channel.publish("worker-1", &ack(id)).await, 2);
            assert_eq!(fast.receiver.recv().await, Some(ack(id)));
        }

        // slow never drained: its queue is full now
        assert_eq!(channel.publish("worker-1", &ack(3)).await, 1);
        assert_eq!(fast.receiver.recv().await, Some(ack(3)));
        assert_eq!(channel.connection_count("worker-1").await, 1);
        drop(slow);
    }

    #[tokio::test]
    async fn test_evicted_connection_sees_closed_queue() {
        let channel = RealtimeChannel::new(1);
        let mut sub = channel.subscribe("worker-1").await;

        channel.publish("worker-1", &ack(1)).await;
        channel.publish("worker-1", &ack(2)).await;

        assert_eq!(sub.receiver.recv().await, Some(ack(1)));
        assert_eq!(sub.receiver.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_not_live() {
        let channel = RealtimeChannel::new(4);
        let sub = channel.subscribe("worker-1").await;
        drop(sub);

        assert!(!channel.has_subscribers("worker-1").await);
        assert_eq!(channel.publish("worker-1", &ack(1)).await, 0);
        assert_eq!(channel.connection_count("worker-1").await, 0);
    }

    #[tokio::test]
    async fn test_close_all_ends_connection_loops() {
        let channel = RealtimeChannel::new(4);
        let mut a = channel.subscribe("worker-1").await;
        let mut b = channel.subscribe("biz-1").await;

        channel.close_all().await;

        assert_eq!(a.receiver.recv().await, None);
        assert_eq!(b.receiver.recv().await, None);
        assert!(!channel.has_subscribers("worker-1").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_and_publish() {
        let channel = Arc::new(RealtimeChannel::new(256));
        let mut handles = Vec::new();
        for i in 0..32 {
            let channel = Arc::clone(&channel);
            handles.push(tokio::spawn(async move {
                let user = format!("user-{}", i % 4);
                let sub = channel.subscribe(&user).await;
                channel.publish(&user, &ack(i)).await;
                channel.unsubscribe(&user, sub.id).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..4 {
            assert_eq!(channel.connection_count(&format!("user-{}", i)).await, 0);
        }
    }
}
