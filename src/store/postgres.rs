use async_trait::async_trait;

use super::{validate_new_message, validate_user_id, MessageStore};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::message::{Message, MessageId};
use crate::utils::conversation_key;

/// PostgreSQL implementation of MessageStore
///
/// Appends take a transaction-scoped advisory lock keyed by the conversation,
/// so ids and timestamps inside one conversation follow a single total order
/// while unrelated conversations append in parallel.
pub struct PostgresMessageStore {
    pool: DbPool,
}

impl PostgresMessageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn append(&self, sender_id: &str, receiver_id: &str, text: &str) -> AppResult<Message> {
        let text = validate_new_message(sender_id, receiver_id, text)?;
        let key = conversation_key(sender_id, receiver_id);

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_key, sender_id, receiver_id, text, created_at)
            VALUES (
                $1, $2, $3, $4,
                GREATEST(
                    clock_timestamp(),
                    COALESCE(
                        (SELECT MAX(created_at) FROM messages WHERE conversation_key = $1),
                        clock_timestamp()
                    )
                )
            )
            RETURNING id, sender_id, receiver_id, text, created_at, read
            "#,
        )
        .bind(&key)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(&text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

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

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, text, created_at, read
            FROM messages
            WHERE conversation_key = $1
              AND ((sender_id = $3 AND receiver_id = $4) OR (sender_id = $4 AND receiver_id = $3))
              AND ($2::BIGINT IS NULL OR id > $2)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(conversation_key(user_a, user_b))
        .bind(since_id)
        .bind(user_a)
        .bind(user_b)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Message>> {
        validate_user_id(user_id, "userId")?;

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, text, created_at, read
            FROM messages
            WHERE sender_id = $1 OR receiver_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_read(&self, reader_id: &str, counterparty_id: &str) -> AppResult<u64> {
        validate_user_id(reader_id, "readerId")?;
        validate_user_id(counterparty_id, "counterpartyId")?;

        let result = sqlx::query(
            r#"
            UPDATE messages
            SET read = TRUE
            WHERE receiver_id = $1
              AND sender_id = $2
              AND read = FALSE
            "#,
        )
        .bind(reader_id)
        .bind(counterparty_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
