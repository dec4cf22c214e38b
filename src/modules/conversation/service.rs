use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{
        model::{
            ConversationDetail, ConversationRow, NewConversation,
            ParticipantDetailWithConversation, ParticipantRow,
        },
        repository::ConversationRepository,
    },
};

#[derive(Clone)]
pub struct ConversationService<R>
where
    R: ConversationRepository + Send + Sync + 'static,
{
    conversation_repo: Arc<R>,
}

impl<R> ConversationService<R>
where
    R: ConversationRepository + Send + Sync + 'static,
{
    pub fn with_dependencies(conversation_repo: Arc<R>) -> Self {
        ConversationService { conversation_repo }
    }

    /// All conversations the user actively participates in, annotated with
    /// participants, last-message snapshot and unread count.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationDetail>, error::SystemError> {
        let conversations = self.conversation_repo.list_for_user(&user_id).await?;

        let conversation_ids: Vec<Uuid> =
            conversations.iter().map(|conv| conv.conversation_id).collect();

        let participants = self.conversation_repo.participants_for(&conversation_ids).await?;

        let mut participant_map = participants.into_iter().fold(
            HashMap::<Uuid, Vec<ParticipantDetailWithConversation>>::new(),
            |mut acc, participant| {
                acc.entry(participant.conversation_id).or_default().push(participant);
                acc
            },
        );

        let res = conversations
            .into_iter()
            .map(|conv| {
                let participants =
                    participant_map.remove(&conv.conversation_id).unwrap_or_default();
                assemble_detail(conv, participants, &user_id)
            })
            .collect();

        Ok(res)
    }

    /// Zero rows is a valid `None` here, not an error.
    pub async fn fetch_one(
        &self,
        conversation_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Option<ConversationDetail>, error::SystemError> {
        let Some(conv) = self.conversation_repo.find_detail(&conversation_id, &viewer_id).await?
        else {
            return Ok(None);
        };

        let participants = self.conversation_repo.participants_for(&[conversation_id]).await?;

        Ok(Some(assemble_detail(conv, participants, &viewer_id)))
    }

    pub async fn create(
        &self,
        title: Option<String>,
        participant_ids: Vec<Uuid>,
        is_group: bool,
        creator_id: Uuid,
    ) -> Result<Option<ConversationDetail>, error::SystemError> {
        if participant_ids.is_empty() {
            return Err(error::SystemError::bad_request(
                "At least one participant is required to create a conversation",
            ));
        }

        let conversation = self
            .conversation_repo
            .create(&NewConversation { title, is_group, creator_id, participant_ids })
            .await?;

        self.fetch_one(conversation.id, creator_id).await
    }

    /// Idempotent: repeating the same message id leaves the pointer where it
    /// is, and the pointer never moves backwards.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        message_id: Uuid,
    ) -> Result<(), error::SystemError> {
        let updated = self
            .conversation_repo
            .advance_read_pointer(&conversation_id, &user_id, &message_id)
            .await?;

        if updated == 0
            && !self.conversation_repo.is_active_participant(&conversation_id, &user_id).await?
        {
            return Err(error::SystemError::not_found("Conversation not found"));
        }

        Ok(())
    }

    pub async fn is_active_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError> {
        self.conversation_repo.is_active_participant(conversation_id, user_id).await
    }
}

fn assemble_detail(
    conv: ConversationRow,
    participants: Vec<ParticipantDetailWithConversation>,
    viewer_id: &Uuid,
) -> ConversationDetail {
    let participants: Vec<ParticipantRow> = participants
        .into_iter()
        .map(|p| ParticipantRow {
            user_id: p.user_id,
            email: p.email,
            display_name: p.display_name,
            avatar_url: p.avatar_url,
            role: p.role,
            last_read_message_id: p.last_read_message_id,
            joined_at: p.joined_at,
        })
        .collect();

    let display_name = display_name_for(conv.title.as_deref(), &participants, viewer_id);

    ConversationDetail {
        conversation_id: conv.conversation_id,
        title: conv.title,
        display_name,
        is_group: conv.is_group,
        metadata: conv.metadata,
        last_message: conv.last_message,
        unread_count: conv.unread_count,
        participants,
        created_at: conv.created_at,
        updated_at: conv.updated_at,
    }
}

/// Explicit title wins; otherwise the thread is named after the other
/// participants.
fn display_name_for(
    title: Option<&str>,
    participants: &[ParticipantRow],
    viewer_id: &Uuid,
) -> String {
    if let Some(title) = title {
        if !title.trim().is_empty() {
            return title.to_string();
        }
    }

    let others: Vec<&str> = participants
        .iter()
        .filter(|p| p.user_id != *viewer_id)
        .map(|p| p.display_name.as_str())
        .collect();

    if others.is_empty() {
        "Conversation".to_string()
    } else {
        others.join(", ")
    }
}
