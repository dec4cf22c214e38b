use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::modules::conversation::schema::ParticipantRole;

/// Flat row shape of the listing query before it is split into the nested
/// response types.
#[derive(FromRow)]
pub struct ConversationRaw {
    pub id: Uuid,
    pub title: Option<String>,
    pub is_group: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,

    pub last_message_id: Option<Uuid>,
    pub last_content: Option<String>,
    pub last_user_id: Option<Uuid>,
    pub last_created_at: Option<chrono::DateTime<chrono::Utc>>,

    pub unread_count: i64,
}

/// Snapshot of the newest message, derived per query from the messages
/// table. The message table stays the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessageRow {
    pub message_id: Uuid,
    pub content: String,
    pub user_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ParticipantRow {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: ParticipantRole,
    pub last_read_message_id: Option<Uuid>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ParticipantDetailWithConversation {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: ParticipantRole,
    pub last_read_message_id: Option<Uuid>,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// Listing row without participants; the service stitches those on.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub conversation_id: Uuid,
    pub title: Option<String>,
    pub is_group: bool,
    pub metadata: Option<serde_json::Value>,
    pub last_message: Option<LastMessageRow>,
    pub unread_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ConversationRaw> for ConversationRow {
    fn from(r: ConversationRaw) -> Self {
        let last_message = match (r.last_message_id, r.last_content, r.last_user_id, r.last_created_at)
        {
            (Some(message_id), Some(content), Some(user_id), Some(created_at)) => {
                Some(LastMessageRow { message_id, content, user_id, created_at })
            }
            _ => None,
        };

        ConversationRow {
            conversation_id: r.id,
            title: r.title,
            is_group: r.is_group,
            metadata: r.metadata,
            last_message,
            unread_count: r.unread_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    pub conversation_id: Uuid,
    pub title: Option<String>,
    /// Title when present, otherwise the other participants' names.
    pub display_name: String,
    pub is_group: bool,
    pub metadata: Option<serde_json::Value>,
    pub last_message: Option<LastMessageRow>,
    pub unread_count: i64,
    pub participants: Vec<ParticipantRow>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub title: Option<String>,
    pub is_group: bool,
    pub creator_id: Uuid,
    pub participant_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub is_group: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MarkConversationReadRequest {
    pub message_id: Uuid,
}
