/// WebSocket event protocol between clients and the realtime layer.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::message::model::MessageWithRelations;

use super::feed::ConnectionState;

/// Events sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Authenticate the connection with a bearer token.
    #[serde(rename_all = "camelCase")]
    Auth { token: String },

    /// Open a feed for one conversation (requires active membership).
    #[serde(rename_all = "camelCase")]
    Subscribe { conversation_id: Uuid },

    /// Tear the feed down again.
    #[serde(rename_all = "camelCase")]
    Unsubscribe { conversation_id: Uuid },

    /// Text-only send over the open connection; attachments go through the
    /// REST endpoint.
    #[serde(rename_all = "camelCase")]
    SendMessage { conversation_id: Uuid, content: String },

    /// Keep-alive.
    Ping,
}

/// Events sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    AuthSuccess { user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    AuthFailed { reason: String },

    /// Tri-state feed status for the client's indicator.
    #[serde(rename_all = "camelCase")]
    SubscriptionState { conversation_id: Uuid, state: ConnectionState },

    /// Initial page delivered when a subscription connects.
    #[serde(rename_all = "camelCase")]
    Snapshot { conversation_id: Uuid, messages: Vec<MessageWithRelations> },

    #[serde(rename_all = "camelCase")]
    MessageNew { conversation_id: Uuid, message: MessageWithRelations },

    #[serde(rename_all = "camelCase")]
    MessageDeleted { conversation_id: Uuid, message_id: Uuid },

    #[serde(rename_all = "camelCase")]
    ReceiptUpserted { conversation_id: Uuid, message_id: Uuid, user_id: Uuid },

    Pong,

    #[serde(rename_all = "camelCase")]
    Error { message: String },
}
