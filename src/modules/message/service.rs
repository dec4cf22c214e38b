use actix::Addr;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::repository::ConversationRepository;
use crate::modules::message::model::{InsertMessage, MessageWithRelations, NewAttachment};
use crate::modules::message::repository::{
    MessageRepository, ReactionRepository, ReadReceiptRepository,
};
use crate::modules::message::schema::{MessageEntity, ReactionEntity, ReadReceiptEntity};
use crate::modules::realtime::events::PublishChange;
use crate::modules::realtime::feed::ChangeEvent;
use crate::modules::realtime::server::RealtimeServer;
use crate::modules::storage::model::UploadedFile;
use crate::modules::storage::service::AttachmentStorage;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Message service with generic repositories so tests can swap the store.
#[derive(Clone)]
pub struct MessageService<M, C, R, T>
where
    M: MessageRepository + Send + Sync,
    C: ConversationRepository + Send + Sync,
    R: ReactionRepository + Send + Sync,
    T: ReadReceiptRepository + Send + Sync,
{
    message_repo: Arc<M>,
    conversation_repo: Arc<C>,
    reaction_repo: Arc<R>,
    receipt_repo: Arc<T>,
    storage: Arc<AttachmentStorage>,
    realtime: Option<Addr<RealtimeServer>>,
}

impl<M, C, R, T> MessageService<M, C, R, T>
where
    M: MessageRepository + Send + Sync,
    C: ConversationRepository + Send + Sync,
    R: ReactionRepository + Send + Sync,
    T: ReadReceiptRepository + Send + Sync,
{
    pub fn with_dependencies(
        message_repo: Arc<M>,
        conversation_repo: Arc<C>,
        reaction_repo: Arc<R>,
        receipt_repo: Arc<T>,
        storage: Arc<AttachmentStorage>,
        realtime: Option<Addr<RealtimeServer>>,
    ) -> Self {
        MessageService {
            message_repo,
            conversation_repo,
            reaction_repo,
            receipt_repo,
            storage,
            realtime,
        }
    }

    fn publish(&self, conversation_id: Uuid, change: ChangeEvent) {
        if let Some(server) = &self.realtime {
            server.do_send(PublishChange { conversation_id, change });
        }
    }

    /// Window of the conversation's timeline, ascending by creation time,
    /// with attachments, reactions and read receipts nested per message.
    pub async fn fetch_page(
        &self,
        conversation_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<MessageWithRelations>, error::SystemError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        let messages = self.message_repo.fetch_page(&conversation_id, limit, offset).await?;
        self.with_relations(messages).await
    }

    /// Bounded re-fetch of one announced row, used by the realtime layer.
    pub async fn fetch_one_with_relations(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<MessageWithRelations>, error::SystemError> {
        let Some(message) =
            self.message_repo.find_in_conversation(&conversation_id, &message_id).await?
        else {
            return Ok(None);
        };

        Ok(self.with_relations(vec![message]).await?.pop())
    }

    /// Send flow: validate, write attachments to storage, then message row +
    /// attachment rows + sender receipt in one transaction. Stored objects
    /// are removed again when the transaction fails.
    pub async fn send(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        content: String,
        files: Vec<UploadedFile>,
    ) -> Result<MessageWithRelations, error::SystemError> {
        let content = content.trim().to_string();
        if content.is_empty() && files.is_empty() {
            return Err(error::SystemError::bad_request(
                "A message needs text content or at least one attachment",
            ));
        }

        if !self.conversation_repo.is_active_participant(&conversation_id, &user_id).await? {
            return Err(error::SystemError::forbidden(
                "Only active participants can post to a conversation",
            ));
        }

        // Every file is validated before any of them is written.
        for file in &files {
            self.storage.validate(file)?;
        }

        let message_id = Uuid::now_v7();

        let mut stored = Vec::with_capacity(files.len());
        for file in &files {
            match self.storage.store(&message_id, file).await {
                Ok(object) => stored.push(object),
                Err(e) => {
                    for object in &stored {
                        self.storage.remove(&object.storage_path).await;
                    }
                    return Err(e);
                }
            }
        }

        let attachments: Vec<NewAttachment> = stored
            .iter()
            .map(|object| NewAttachment {
                id: Uuid::now_v7(),
                message_id,
                file_name: object.file_name.clone(),
                mime_type: object.mime_type.clone(),
                byte_size: object.byte_size,
                url: object.url.clone(),
                storage_path: object.storage_path.clone(),
            })
            .collect();

        let insert = InsertMessage {
            id: message_id,
            conversation_id,
            user_id,
            content,
            is_system: false,
            metadata: None,
        };

        let message = match self.message_repo.create(&insert, &attachments).await {
            Ok(message) => message,
            Err(e) => {
                // The row never landed; take the stored objects back out.
                for object in &stored {
                    self.storage.remove(&object.storage_path).await;
                }
                return Err(e);
            }
        };

        self.publish(conversation_id, ChangeEvent::MessageInserted { message_id: message.id });

        self.with_relations(vec![message])
            .await?
            .pop()
            .ok_or_else(|| error::SystemError::not_found("Message not found"))
    }

    pub async fn mark_read(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<ReadReceiptEntity, error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(&message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        let receipt = self.receipt_repo.upsert(&message_id, &user_id).await?;

        self.publish(
            message.conversation_id,
            ChangeEvent::ReceiptUpserted { message_id, user_id },
        );

        Ok(receipt)
    }

    /// Only the author may delete. Hard removal; attachment rows cascade,
    /// stored objects stay behind.
    pub async fn delete(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let message = self
            .message_repo
            .find_by_id(&message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        if message.user_id != user_id {
            return Err(error::SystemError::forbidden("You can only delete your own messages"));
        }

        let deleted = self.message_repo.delete(&message_id).await?;

        if !deleted {
            return Err(error::SystemError::not_found("Message not found or already deleted"));
        }

        self.publish(message.conversation_id, ChangeEvent::MessageDeleted { message_id });

        Ok(())
    }

    pub async fn add_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<ReactionEntity, error::SystemError> {
        self.message_repo
            .find_by_id(&message_id)
            .await?
            .ok_or_else(|| error::SystemError::not_found("Message not found"))?;

        self.reaction_repo.add(&message_id, &user_id, emoji).await
    }

    pub async fn remove_reaction(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<(), error::SystemError> {
        let removed = self.reaction_repo.remove(&message_id, &user_id, emoji).await?;

        if !removed {
            return Err(error::SystemError::not_found("Reaction not found"));
        }

        Ok(())
    }

    async fn with_relations(
        &self,
        messages: Vec<MessageEntity>,
    ) -> Result<Vec<MessageWithRelations>, error::SystemError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();

        let mut attachment_map = self.message_repo.attachments_for(&ids).await?.into_iter().fold(
            HashMap::<Uuid, Vec<_>>::new(),
            |mut acc, attachment| {
                acc.entry(attachment.message_id).or_default().push(attachment);
                acc
            },
        );

        let mut reaction_map = self.reaction_repo.reactions_for(&ids).await?.into_iter().fold(
            HashMap::<Uuid, Vec<_>>::new(),
            |mut acc, reaction| {
                acc.entry(reaction.message_id).or_default().push(reaction);
                acc
            },
        );

        let mut receipt_map = self.receipt_repo.receipts_for(&ids).await?.into_iter().fold(
            HashMap::<Uuid, Vec<_>>::new(),
            |mut acc, receipt| {
                acc.entry(receipt.message_id).or_default().push(receipt);
                acc
            },
        );

        Ok(messages
            .into_iter()
            .map(|message| MessageWithRelations {
                attachments: attachment_map.remove(&message.id).unwrap_or_default(),
                reactions: reaction_map.remove(&message.id).unwrap_or_default(),
                read_receipts: receipt_map.remove(&message.id).unwrap_or_default(),
                message,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::model::StorageConfig;
    use crate::test::InMemoryStore;

    type Svc = MessageService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

    fn service(store: &Arc<InMemoryStore>) -> Svc {
        MessageService::with_dependencies(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(AttachmentStorage::new(StorageConfig::default())),
            None,
        )
    }

    #[tokio::test]
    async fn send_then_fetch_round_trip() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let conversation = store.seed_conversation(&[alice, bob]);
        let svc = service(&store);

        let sent =
            svc.send(conversation, alice, "hello".to_string(), Vec::new()).await.unwrap();

        let page = svc.fetch_page(conversation, None, None).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].message.id, sent.message.id);
        assert_eq!(page[0].message.content, "hello");
        assert_eq!(page[0].message.user_id, alice);
    }

    #[tokio::test]
    async fn send_rejects_blank_message_without_attachments() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let conversation = store.seed_conversation(&[alice]);
        let svc = service(&store);

        let result = svc.send(conversation, alice, "   ".to_string(), Vec::new()).await;

        assert!(matches!(result, Err(error::SystemError::BadRequest(_))));
        // Validation failed before any row was written.
        assert!(store.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_rejects_non_participant() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let outsider = store.seed_user("mallory");
        let conversation = store.seed_conversation(&[alice]);
        let svc = service(&store);

        let result = svc.send(conversation, outsider, "hi".to_string(), Vec::new()).await;

        assert!(matches!(result, Err(error::SystemError::Forbidden(_))));
    }

    #[tokio::test]
    async fn send_rejects_left_participant() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let conversation = store.seed_conversation(&[alice, bob]);
        store.leave(conversation, bob);
        let svc = service(&store);

        let result = svc.send(conversation, bob, "hi".to_string(), Vec::new()).await;

        assert!(matches!(result, Err(error::SystemError::Forbidden(_))));
    }

    #[tokio::test]
    async fn send_upserts_sender_receipt() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let conversation = store.seed_conversation(&[alice]);
        let svc = service(&store);

        let sent = svc.send(conversation, alice, "hello".to_string(), Vec::new()).await.unwrap();

        assert_eq!(sent.read_receipts.len(), 1);
        assert_eq!(sent.read_receipts[0].user_id, alice);
    }

    #[tokio::test]
    async fn fetch_page_orders_by_creation_time_not_insertion_order() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let conversation = store.seed_conversation(&[alice, bob]);
        let svc = service(&store);

        let first = svc.send(conversation, alice, "first".to_string(), Vec::new()).await.unwrap();
        let second = svc.send(conversation, bob, "second".to_string(), Vec::new()).await.unwrap();

        // Backdate the later insert below the earlier one.
        store.shift_message_time(second.message.id, -10_000_000);

        let page = svc.fetch_page(conversation, None, None).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message.id, second.message.id);
        assert_eq!(page[1].message.id, first.message.id);
    }

    #[tokio::test]
    async fn fetch_page_windows_with_offset() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let conversation = store.seed_conversation(&[alice]);
        let svc = service(&store);

        for content in ["one", "two", "three"] {
            svc.send(conversation, alice, content.to_string(), Vec::new()).await.unwrap();
        }

        let page = svc.fetch_page(conversation, Some(2), Some(1)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].message.content, "two");
        assert_eq!(page[1].message.content, "three");
    }

    #[tokio::test]
    async fn delete_requires_author() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let conversation = store.seed_conversation(&[alice, bob]);
        let svc = service(&store);

        let sent = svc.send(conversation, alice, "mine".to_string(), Vec::new()).await.unwrap();

        let result = svc.delete(sent.message.id, bob).await;
        assert!(matches!(result, Err(error::SystemError::Forbidden(_))));

        // Row intact after the rejected delete.
        let page = svc.fetch_page(conversation, None, None).await.unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_own_message() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let conversation = store.seed_conversation(&[alice]);
        let svc = service(&store);

        let sent = svc.send(conversation, alice, "mine".to_string(), Vec::new()).await.unwrap();
        svc.delete(sent.message.id, alice).await.unwrap();

        assert!(svc.fetch_page(conversation, None, None).await.unwrap().is_empty());
        // A stale reference now fetches nothing, which callers tolerate.
        assert!(svc
            .fetch_one_with_relations(conversation, sent.message.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mark_read_upserts_single_receipt() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let bob = store.seed_user("bob");
        let conversation = store.seed_conversation(&[alice, bob]);
        let svc = service(&store);

        let sent = svc.send(conversation, alice, "hello".to_string(), Vec::new()).await.unwrap();

        svc.mark_read(sent.message.id, bob).await.unwrap();
        svc.mark_read(sent.message.id, bob).await.unwrap();

        let page = svc.fetch_page(conversation, None, None).await.unwrap();
        let receipts: Vec<_> =
            page[0].read_receipts.iter().filter(|r| r.user_id == bob).collect();
        assert_eq!(receipts.len(), 1);
    }

    #[tokio::test]
    async fn reactions_round_trip_and_dedupe() {
        let store = InMemoryStore::new();
        let alice = store.seed_user("alice");
        let conversation = store.seed_conversation(&[alice]);
        let svc = service(&store);

        let sent = svc.send(conversation, alice, "hello".to_string(), Vec::new()).await.unwrap();

        svc.add_reaction(sent.message.id, alice, "👍").await.unwrap();
        svc.add_reaction(sent.message.id, alice, "👍").await.unwrap();

        let page = svc.fetch_page(conversation, None, None).await.unwrap();
        assert_eq!(page[0].reactions.len(), 1);

        svc.remove_reaction(sent.message.id, alice, "👍").await.unwrap();
        let page = svc.fetch_page(conversation, None, None).await.unwrap();
        assert!(page[0].reactions.is_empty());
    }
}
