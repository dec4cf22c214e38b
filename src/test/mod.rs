//! In-memory implementation of the repository traits, mirroring the SQL
//! semantics of the Postgres implementations so the services can be tested
//! without a database.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::api::error;
use crate::modules::conversation::model::{
    ConversationRow, LastMessageRow, NewConversation, ParticipantDetailWithConversation,
};
use crate::modules::conversation::repository::ConversationRepository;
use crate::modules::conversation::schema::{
    ConversationEntity, ParticipantEntity, ParticipantRole,
};
use crate::modules::message::model::{InsertMessage, NewAttachment};
use crate::modules::message::repository::{
    MessageRepository, ReactionRepository, ReadReceiptRepository,
};
use crate::modules::message::schema::{
    AttachmentEntity, MessageEntity, ReactionEntity, ReadReceiptEntity,
};

#[derive(Default)]
pub struct InMemoryStore {
    pub conversations: Mutex<Vec<ConversationEntity>>,
    pub participants: Mutex<Vec<ParticipantEntity>>,
    pub users: Mutex<Vec<(Uuid, String)>>,
    pub messages: Mutex<Vec<MessageEntity>>,
    pub attachments: Mutex<Vec<AttachmentEntity>>,
    pub reactions: Mutex<Vec<ReactionEntity>>,
    pub receipts: Mutex<Vec<ReadReceiptEntity>>,
    tick: Mutex<i64>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Strictly increasing clock so creation timestamps order like NOW().
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        let mut tick = self.tick.lock().unwrap();
        *tick += 1;
        chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap()
            + chrono::Duration::microseconds(*tick * 1000)
    }

    pub fn seed_user(&self, name: &str) -> Uuid {
        let id = Uuid::now_v7();
        self.users.lock().unwrap().push((id, name.to_string()));
        id
    }

    pub fn seed_conversation(&self, user_ids: &[Uuid]) -> Uuid {
        let now = self.now();
        let id = Uuid::now_v7();
        self.conversations.lock().unwrap().push(ConversationEntity {
            id,
            title: None,
            is_group: user_ids.len() > 2,
            metadata: None,
            created_at: now,
            updated_at: now,
        });

        let mut participants = self.participants.lock().unwrap();
        for user_id in user_ids {
            participants.push(ParticipantEntity {
                conversation_id: id,
                user_id: *user_id,
                role: ParticipantRole::Member,
                last_read_message_id: None,
                joined_at: now,
                left_at: None,
            });
        }

        id
    }

    /// Membership departure: the row stays, `left_at` is set.
    pub fn leave(&self, conversation_id: Uuid, user_id: Uuid) {
        let now = self.now();
        let mut participants = self.participants.lock().unwrap();
        if let Some(p) = participants
            .iter_mut()
            .find(|p| p.conversation_id == conversation_id && p.user_id == user_id)
        {
            p.left_at = Some(now);
        }
    }

    /// Direct message insert for tests that bypass the message service.
    pub fn seed_message(&self, conversation_id: Uuid, user_id: Uuid, content: &str) -> Uuid {
        let now = self.now();
        let id = Uuid::now_v7();
        self.messages.lock().unwrap().push(MessageEntity {
            id,
            conversation_id,
            user_id,
            content: content.to_string(),
            is_system: false,
            metadata: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Adjusts one message's creation time, so ordering can diverge from
    /// insertion order.
    pub fn shift_message_time(&self, message_id: Uuid, delta_micros: i64) {
        let mut messages = self.messages.lock().unwrap();
        if let Some(m) = messages.iter_mut().find(|m| m.id == message_id) {
            m.created_at = m.created_at + chrono::Duration::microseconds(delta_micros);
        }
    }

    fn last_message_of(&self, conversation_id: Uuid) -> Option<LastMessageRow> {
        let messages = self.messages.lock().unwrap();
        messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .max_by_key(|m| (m.created_at, m.id))
            .map(|m| LastMessageRow {
                message_id: m.id,
                content: m.content.clone(),
                user_id: m.user_id,
                created_at: m.created_at,
            })
    }

    fn unread_for(&self, conversation_id: Uuid, user_id: Uuid) -> i64 {
        let participants = self.participants.lock().unwrap();
        let Some(p) = participants.iter().find(|p| {
            p.conversation_id == conversation_id && p.user_id == user_id && p.left_at.is_none()
        }) else {
            return 0;
        };

        let messages = self.messages.lock().unwrap();
        let pointer_time = p
            .last_read_message_id
            .and_then(|id| messages.iter().find(|m| m.id == id))
            .map(|m| m.created_at);

        messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && m.user_id != user_id)
            .filter(|m| match pointer_time {
                None => true,
                Some(t) => m.created_at > t,
            })
            .count() as i64
    }

    fn row_for(&self, conversation: &ConversationEntity, viewer_id: Uuid) -> ConversationRow {
        ConversationRow {
            conversation_id: conversation.id,
            title: conversation.title.clone(),
            is_group: conversation.is_group,
            metadata: conversation.metadata.clone(),
            last_message: self.last_message_of(conversation.id),
            unread_count: self.unread_for(conversation.id, viewer_id),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryStore {
    async fn list_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationRow>, error::SystemError> {
        let member_of: Vec<ConversationEntity> = {
            let participants = self.participants.lock().unwrap();
            let conversations = self.conversations.lock().unwrap();
            conversations
                .iter()
                .filter(|c| {
                    participants.iter().any(|p| {
                        p.conversation_id == c.id && p.user_id == *user_id && p.left_at.is_none()
                    })
                })
                .cloned()
                .collect()
        };

        let mut rows: Vec<ConversationRow> =
            member_of.iter().map(|c| self.row_for(c, *user_id)).collect();

        rows.sort_by_key(|r| {
            std::cmp::Reverse(
                r.last_message.as_ref().map(|l| l.created_at).unwrap_or(r.updated_at),
            )
        });

        Ok(rows)
    }

    async fn find_detail(
        &self,
        conversation_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<Option<ConversationRow>, error::SystemError> {
        let conversation = {
            let conversations = self.conversations.lock().unwrap();
            conversations.iter().find(|c| c.id == *conversation_id).cloned()
        };

        Ok(conversation.map(|c| self.row_for(&c, *viewer_id)))
    }

    async fn participants_for(
        &self,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<ParticipantDetailWithConversation>, error::SystemError> {
        let participants = self.participants.lock().unwrap();
        let users = self.users.lock().unwrap();

        Ok(participants
            .iter()
            .filter(|p| conversation_ids.contains(&p.conversation_id) && p.left_at.is_none())
            .map(|p| {
                let name = users
                    .iter()
                    .find(|(id, _)| *id == p.user_id)
                    .map(|(_, name)| name.clone())
                    .unwrap_or_else(|| "unknown".to_string());
                ParticipantDetailWithConversation {
                    conversation_id: p.conversation_id,
                    user_id: p.user_id,
                    email: format!("{name}@example.com"),
                    display_name: name,
                    avatar_url: None,
                    role: p.role.clone(),
                    last_read_message_id: p.last_read_message_id,
                    joined_at: p.joined_at,
                }
            })
            .collect())
    }

    async fn create(
        &self,
        new: &NewConversation,
    ) -> Result<ConversationEntity, error::SystemError> {
        let now = self.now();
        let conversation = ConversationEntity {
            id: Uuid::now_v7(),
            title: new.title.clone(),
            is_group: new.is_group,
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        self.conversations.lock().unwrap().push(conversation.clone());

        let mut member_ids: Vec<Uuid> = vec![new.creator_id];
        for id in &new.participant_ids {
            if !member_ids.contains(id) {
                member_ids.push(*id);
            }
        }

        let mut participants = self.participants.lock().unwrap();
        for user_id in member_ids {
            participants.push(ParticipantEntity {
                conversation_id: conversation.id,
                user_id,
                role: ParticipantRole::Member,
                last_read_message_id: None,
                joined_at: now,
                left_at: None,
            });
        }

        Ok(conversation)
    }

    async fn advance_read_pointer(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<u64, error::SystemError> {
        let (target_time, current_time) = {
            let messages = self.messages.lock().unwrap();
            let target = messages
                .iter()
                .find(|m| m.id == *message_id && m.conversation_id == *conversation_id)
                .map(|m| m.created_at);

            let participants = self.participants.lock().unwrap();
            let current = participants
                .iter()
                .find(|p| {
                    p.conversation_id == *conversation_id
                        && p.user_id == *user_id
                        && p.left_at.is_none()
                })
                .and_then(|p| p.last_read_message_id)
                .and_then(|id| messages.iter().find(|m| m.id == id))
                .map(|m| m.created_at);

            (target, current)
        };

        let Some(target_time) = target_time else {
            return Ok(0);
        };

        if let Some(current_time) = current_time {
            if target_time < current_time {
                return Ok(0);
            }
        }

        let mut participants = self.participants.lock().unwrap();
        let Some(p) = participants.iter_mut().find(|p| {
            p.conversation_id == *conversation_id && p.user_id == *user_id && p.left_at.is_none()
        }) else {
            return Ok(0);
        };

        p.last_read_message_id = Some(*message_id);
        Ok(1)
    }

    async fn is_active_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        let participants = self.participants.lock().unwrap();
        Ok(participants.iter().any(|p| {
            p.conversation_id == *conversation_id && p.user_id == *user_id && p.left_at.is_none()
        }))
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(
        &self,
        message: &InsertMessage,
        attachments: &[NewAttachment],
    ) -> Result<MessageEntity, error::SystemError> {
        let now = self.now();

        let entity = MessageEntity {
            id: message.id,
            conversation_id: message.conversation_id,
            user_id: message.user_id,
            content: message.content.clone(),
            is_system: message.is_system,
            metadata: message.metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        self.messages.lock().unwrap().push(entity.clone());

        {
            let mut stored = self.attachments.lock().unwrap();
            for attachment in attachments {
                stored.push(AttachmentEntity {
                    id: attachment.id,
                    message_id: attachment.message_id,
                    file_name: attachment.file_name.clone(),
                    mime_type: attachment.mime_type.clone(),
                    byte_size: attachment.byte_size,
                    url: attachment.url.clone(),
                    storage_path: attachment.storage_path.clone(),
                    created_at: now,
                });
            }
        }

        ReadReceiptRepository::upsert(self, &entity.id, &entity.user_id).await?;

        let mut conversations = self.conversations.lock().unwrap();
        if let Some(c) = conversations.iter_mut().find(|c| c.id == message.conversation_id) {
            c.updated_at = now;
        }

        Ok(entity)
    }

    async fn fetch_page(
        &self,
        conversation_id: &Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageEntity>, error::SystemError> {
        let messages = self.messages.lock().unwrap();
        let mut page: Vec<MessageEntity> =
            messages.iter().filter(|m| m.conversation_id == *conversation_id).cloned().collect();
        page.sort_by_key(|m| (m.created_at, m.id));

        Ok(page.into_iter().skip(offset as usize).take(limit as usize).collect())
    }

    async fn find_by_id(
        &self,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let messages = self.messages.lock().unwrap();
        Ok(messages.iter().find(|m| m.id == *message_id).cloned())
    }

    async fn find_in_conversation(
        &self,
        conversation_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<Option<MessageEntity>, error::SystemError> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .find(|m| m.id == *message_id && m.conversation_id == *conversation_id)
            .cloned())
    }

    async fn delete(&self, message_id: &Uuid) -> Result<bool, error::SystemError> {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| m.id != *message_id);
        let deleted = messages.len() != before;

        if deleted {
            // FK cascade
            self.attachments.lock().unwrap().retain(|a| a.message_id != *message_id);
            self.reactions.lock().unwrap().retain(|r| r.message_id != *message_id);
            self.receipts.lock().unwrap().retain(|r| r.message_id != *message_id);
        }

        Ok(deleted)
    }

    async fn attachments_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<AttachmentEntity>, error::SystemError> {
        let attachments = self.attachments.lock().unwrap();
        Ok(attachments.iter().filter(|a| message_ids.contains(&a.message_id)).cloned().collect())
    }
}

#[async_trait::async_trait]
impl ReactionRepository for InMemoryStore {
    async fn add(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<ReactionEntity, error::SystemError> {
        let mut reactions = self.reactions.lock().unwrap();

        if let Some(existing) = reactions
            .iter()
            .find(|r| r.message_id == *message_id && r.user_id == *user_id && r.emoji == emoji)
        {
            return Ok(existing.clone());
        }

        let reaction = ReactionEntity {
            id: Uuid::now_v7(),
            message_id: *message_id,
            user_id: *user_id,
            emoji: emoji.to_string(),
            created_at: chrono::Utc::now(),
        };
        reactions.push(reaction.clone());
        Ok(reaction)
    }

    async fn remove(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
        emoji: &str,
    ) -> Result<bool, error::SystemError> {
        let mut reactions = self.reactions.lock().unwrap();
        let before = reactions.len();
        reactions.retain(|r| {
            !(r.message_id == *message_id && r.user_id == *user_id && r.emoji == emoji)
        });
        Ok(reactions.len() != before)
    }

    async fn reactions_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReactionEntity>, error::SystemError> {
        let reactions = self.reactions.lock().unwrap();
        Ok(reactions.iter().filter(|r| message_ids.contains(&r.message_id)).cloned().collect())
    }
}

#[async_trait::async_trait]
impl ReadReceiptRepository for InMemoryStore {
    async fn upsert(
        &self,
        message_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<ReadReceiptEntity, error::SystemError> {
        let now = self.now();
        let mut receipts = self.receipts.lock().unwrap();

        if let Some(existing) =
            receipts.iter_mut().find(|r| r.message_id == *message_id && r.user_id == *user_id)
        {
            existing.read_at = now;
            return Ok(existing.clone());
        }

        let receipt = ReadReceiptEntity { message_id: *message_id, user_id: *user_id, read_at: now };
        receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn receipts_for(
        &self,
        message_ids: &[Uuid],
    ) -> Result<Vec<ReadReceiptEntity>, error::SystemError> {
        let receipts = self.receipts.lock().unwrap();
        Ok(receipts.iter().filter(|r| message_ids.contains(&r.message_id)).cloned().collect())
    }
}
