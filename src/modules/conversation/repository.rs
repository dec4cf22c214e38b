use uuid::Uuid;

use crate::{
    api::error,
    modules::conversation::{
        model::{ConversationRow, NewConversation, ParticipantDetailWithConversation},
        schema::ConversationEntity,
    },
};

#[async_trait::async_trait]
pub trait ConversationRepository {
    /// All conversations the user is an active participant of, newest
    /// activity first, with last-message snapshot and exact unread count.
    async fn list_for_user(
        &self,
        user_id: &Uuid,
    ) -> Result<Vec<ConversationRow>, error::SystemError>;

    /// Single conversation with the viewer's unread count. Zero rows is a
    /// valid `None`, not an error.
    async fn find_detail(
        &self,
        conversation_id: &Uuid,
        viewer_id: &Uuid,
    ) -> Result<Option<ConversationRow>, error::SystemError>;

    async fn participants_for(
        &self,
        conversation_ids: &[Uuid],
    ) -> Result<Vec<ParticipantDetailWithConversation>, error::SystemError>;

    /// Conversation row plus one participant row per member, committed
    /// atomically.
    async fn create(
        &self,
        new: &NewConversation,
    ) -> Result<ConversationEntity, error::SystemError>;

    /// Advances the caller's read pointer; guarded so it never moves to an
    /// older message. Returns the number of rows that matched.
    async fn advance_read_pointer(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
        message_id: &Uuid,
    ) -> Result<u64, error::SystemError>;

    async fn is_active_participant(
        &self,
        conversation_id: &Uuid,
        user_id: &Uuid,
    ) -> Result<bool, error::SystemError>;
}
