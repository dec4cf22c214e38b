use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::modules::message::schema::{
    AttachmentEntity, MessageEntity, ReactionEntity, ReadReceiptEntity,
};

#[derive(Debug, Clone)]
pub struct InsertMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub is_system: bool,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub byte_size: i64,
    pub url: String,
    pub storage_path: String,
}

/// Message as the API serves it: the row plus its nested collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWithRelations {
    #[serde(flatten)]
    pub message: MessageEntity,
    pub attachments: Vec<AttachmentEntity>,
    pub reactions: Vec<ReactionEntity>,
    pub read_receipts: Vec<ReadReceiptEntity>,
}

impl MessageWithRelations {
    pub fn bare(message: MessageEntity) -> Self {
        Self { message, attachments: Vec::new(), reactions: Vec::new(), read_receipts: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MessagePageQuery {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 32))]
    pub emoji: String,
}
