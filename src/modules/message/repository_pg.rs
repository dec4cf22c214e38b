use uuid::Uuid;

use crate::api::error;
use crate::modules::message::model::{InsertMessage, NewAttachment};
use crate::modules::message::repository::{
    MessageRepository, ReactionRepository, ReadReceiptRepository,
};
use crate::modules::message::schema::{
    AttachmentEntity, MessageEntity, ReactionEntity, ReadReceiptEntity,
};

#[derive(Clone)]
pub struct MessagePgRepository {
    pool: sqlx::PgPool,
}

impl MessagePgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for MessagePgRepository {
    async fn create(
        &self,
        message: &InsertMessage,
        attachments: &[NewAttachment],
    ) -> Result<MessageEntity, error::SystemError> {
        let mut tx = self.pool.begin().await?;

        let entity = sqlx::query_as::<_, MessageEntity>(
            r#"
            INSERT INTO messages (id, conversation_id, user_id, content, is_system, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.user_id)
        .bind(&message.content)
        .bind(message.is_system)
        .bind(&message.metadata)
        .fetch_one(tx.as_mut())
        .await?;

        for attachment in attachments {
            sqlx::query(
                r#"
                INSERT INTO attachments
                    (id, message_id, file_name, mime_type, byte_size, url, storage_path)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(attachment.id)
            .bind(attachment.message_id)
            .bind(&attachment.file_name)
            .bind(&attachment.mime_type)
            .bind(attachment.byte_size)
            .bind(&attachment.url)
            .bind(&attachment.storage_path)
            .execute(tx.as_mut())
            .await?;
        }

        // The sender has seen their own message.
        sqlx::query(
            r#"
            INSERT INTO read_receipts (message_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (message_id, user_id) DO UPDATE
            SET read_at = NOW()
            "#,
        )
        .bind(entity.id)
        .bind(entity.user_id)
        .execute(tx.as_mut())
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE id = $1")
            .bind(message.conversation_id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;

        Ok(entity)
    }

    async fn fetch_page(
        &self,
        conversation_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        // has index on (conversation_id, created_at)
        let messages = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message =
            sqlx::query_as::<_, MessageEntity>("SELECT * FROM messages WHERE id = $1")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(message)
    }

    async fn find_in_conversation(
        &self,
        conversation_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let message = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1 AND id = $2
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn attachments_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<AttachmentEntity>, error::SystemError> {
        let attachments = sqlx::query_as::<_, AttachmentEntity>(
            r#"
            SELECT * FROM attachments
            WHERE message_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(attachments)
    }
}

#[derive(Clone)]
pub struct ReactionPgRepository {
    pool: sqlx::PgPool,
}

impl ReactionPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReactionRepository for ReactionPgRepository {
    async fn add(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<ReactionEntity, error::SystemError> {
        let id = Uuid::now_v7();
        // DO UPDATE so RETURNING yields the row even when it already existed.
        let reaction = sqlx::query_as::<_, ReactionEntity>(
            r#"
            INSERT INTO message_reactions (id, message_id, user_id, emoji)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (message_id, user_id, emoji) DO UPDATE
            SET emoji = EXCLUDED.emoji
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .fetch_one(&self.pool)
        .await?;

        Ok(reaction)
    }

    async fn remove(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<bool, error::SystemError> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_reactions
            WHERE message_id = $1 AND user_id = $2 AND emoji = $3
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reactions_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReactionEntity>, error::SystemError> {
        let reactions = sqlx::query_as::<_, ReactionEntity>(
            r#"
            SELECT * FROM message_reactions
            WHERE message_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(reactions)
    }
}

#[derive(Clone)]
pub struct ReadReceiptPgRepository {
    pool: sqlx::PgPool,
}

impl ReadReceiptPgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadReceiptRepository for ReadReceiptPgRepository {
    async fn upsert(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<ReadReceiptEntity, error::SystemError> {
        let receipt = sqlx::query_as::<_, ReadReceiptEntity>(
            r#"
            INSERT INTO read_receipts (message_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (message_id, user_id) DO UPDATE
            SET read_at = NOW()
            RETURNING *
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(receipt)
    }

    async fn receipts_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError> {
        let receipts = sqlx::query_as::<_, ReadReceiptEntity>(
            r#"
            SELECT * FROM read_receipts
            WHERE message_id = ANY($1)
            ORDER BY read_at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }
}
