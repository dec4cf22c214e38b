/// Actor messages exchanged between the session actors and the server actor.
use actix::prelude::*;
use uuid::Uuid;

use super::feed::ChangeEvent;
use super::session::RealtimeSession;

/// A new WebSocket connection registered with the server.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: Uuid,
    pub addr: Addr<RealtimeSession>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: Uuid,
}

/// Session proved a bearer token; ties the session to a user (multi-device:
/// one user may hold several sessions).
#[derive(Message)]
#[rtype(result = "()")]
pub struct Authenticate {
    pub session_id: Uuid,
    pub user_id: Uuid,
}

/// Sent only after the session verified active membership.
#[derive(Message)]
#[rtype(result = "()")]
pub struct JoinRoom {
    pub user_id: Uuid,
    pub conversation_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct LeaveRoom {
    pub user_id: Uuid,
    pub conversation_id: Uuid,
}

/// Emitted by the services after a committed write; fanned out to every
/// session subscribed to the conversation, the originator included.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct PublishChange {
    pub conversation_id: Uuid,
    pub change: ChangeEvent,
}

/// Server-to-session delivery of one change-feed event.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct ChangeNotification {
    pub conversation_id: Uuid,
    pub change: ChangeEvent,
}
