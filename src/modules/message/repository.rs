use uuid::Uuid;

use crate::{
    api::error,
    modules::message::{
        model::{InsertMessage, NewAttachment},
        schema::{AttachmentEntity, MessageEntity, ReactionEntity, ReadReceiptEntity},
    },
};

#[async_trait::async_trait]
pub trait MessageRepository {
    /// Message row, its attachment rows and the sender's read receipt in one
    /// transaction; the conversation's activity timestamp is bumped with it.
    async fn create(
        &self,
        message: &InsertMessage,
        attachments: &[NewAttachment],
    ) -> Result<MessageEntity, error::SystemError>;

    /// Window of messages ordered by ascending creation time. Plain
    /// offset/limit; concurrent inserts may shift a page, which is accepted
    /// for a chat timeline.
    async fn fetch_page(
        &self,
        conversation_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError>;

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    /// Bounded single-row lookup used by the realtime layer to re-fetch an
    /// announced insert instead of trusting the event payload.
    async fn find_in_conversation(
        &self,
        conversation_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError>;

    /// Hard delete, no tombstone. Returns whether a row was removed.
    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError>;

    async fn attachments_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<AttachmentEntity>, error::SystemError>;
}

#[async_trait::async_trait]
pub trait ReactionRepository {
    async fn add(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<ReactionEntity, error::SystemError>;

    async fn remove(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<bool, error::SystemError>;

    async fn reactions_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReactionEntity>, error::SystemError>;
}

#[async_trait::async_trait]
pub trait ReadReceiptRepository {
    /// Upsert keyed by (message, user): re-reading refreshes `read_at`.
    async fn upsert(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<ReadReceiptEntity, error::SystemError>;

    async fn receipts_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError>;
}
