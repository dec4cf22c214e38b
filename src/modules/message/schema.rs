use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MessageEntity {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_system: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// `storage_path` is the canonical reference to the stored object; `url` is
/// a derived projection of the same object.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AttachmentEntity {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub byte_size: i64,
    pub url: String,
    pub storage_path: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ReactionEntity {
    pub id: Uuid,
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One row per (message, user); re-reading refreshes `read_at` in place.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ReadReceiptEntity {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub read_at: chrono::DateTime<chrono::Utc>,
}
