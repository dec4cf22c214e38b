/// Realtime Server Actor
///
/// Tracks every WebSocket session, which user each session belongs to, and
/// which users have a feed open per conversation. Change events published by
/// the services are fanned out here to the subscribed sessions.
use actix::prelude::*;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::events::*;
use super::session::RealtimeSession;

pub struct RealtimeServer {
    /// session_id -> session actor address
    sessions: HashMap<Uuid, Addr<RealtimeSession>>,

    /// user_id -> set of session_ids (multi-device)
    users: HashMap<Uuid, HashSet<Uuid>>,

    /// conversation_id -> set of user_ids with an open feed
    rooms: HashMap<Uuid, HashSet<Uuid>>,
}

impl RealtimeServer {
    pub fn new() -> Self {
        Self { sessions: HashMap::new(), users: HashMap::new(), rooms: HashMap::new() }
    }

    fn send_to_session(&self, session_id: &Uuid, notification: ChangeNotification) {
        if let Some(session_addr) = self.sessions.get(session_id) {
            session_addr.do_send(notification);
        }
    }
}

impl Actor for RealtimeServer {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Realtime server started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Realtime server stopped");
    }
}

impl Handler<Connect> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        tracing::debug!("New realtime session connected: {}", msg.id);

        self.sessions.insert(msg.id, msg.addr);
    }
}

impl Handler<Disconnect> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        tracing::debug!("Realtime session disconnected: {}", msg.id);

        self.sessions.remove(&msg.id);

        // Find the user owning this session and drop the session from it.
        let mut user_to_remove: Option<Uuid> = None;
        for (&user_id, sessions) in self.users.iter_mut() {
            if sessions.remove(&msg.id) {
                if sessions.is_empty() {
                    user_to_remove = Some(user_id);
                }
                break;
            }
        }

        if let Some(user_id) = user_to_remove {
            self.users.remove(&user_id);

            for room_users in self.rooms.values_mut() {
                room_users.remove(&user_id);
            }
            self.rooms.retain(|_, users| !users.is_empty());

            tracing::info!(
                "User {} fully disconnected (no more sessions) and removed from all rooms",
                user_id
            );
        }
    }
}

impl Handler<Authenticate> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: Authenticate, _: &mut Context<Self>) {
        let sessions = self.users.entry(msg.user_id).or_default();
        sessions.insert(msg.session_id);

        tracing::info!(
            "User {} authenticated on session {} ({} active session(s))",
            msg.user_id,
            msg.session_id,
            sessions.len()
        );
    }
}

impl Handler<JoinRoom> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: JoinRoom, _: &mut Context<Self>) {
        self.rooms.entry(msg.conversation_id).or_default().insert(msg.user_id);

        tracing::info!(
            "User {} joined conversation {} ({} users in room)",
            msg.user_id,
            msg.conversation_id,
            self.rooms.get(&msg.conversation_id).map_or(0, HashSet::len)
        );
    }
}

impl Handler<LeaveRoom> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: LeaveRoom, _: &mut Context<Self>) {
        if let Some(room) = self.rooms.get_mut(&msg.conversation_id) {
            room.remove(&msg.user_id);

            tracing::debug!(
                "User {} left conversation {} ({} users remaining)",
                msg.user_id,
                msg.conversation_id,
                room.len()
            );

            if room.is_empty() {
                self.rooms.remove(&msg.conversation_id);
                tracing::debug!("Room {} empty, removed", msg.conversation_id);
            }
        }
    }
}

/// Fan a committed change out to every session with a feed open on the
/// conversation. The originator is included: sessions dedupe by id.
impl Handler<PublishChange> for RealtimeServer {
    type Result = ();

    fn handle(&mut self, msg: PublishChange, _: &mut Context<Self>) {
        if let Some(room_users) = self.rooms.get(&msg.conversation_id) {
            let mut sent_count = 0;

            for user_id in room_users {
                if let Some(session_ids) = self.users.get(user_id) {
                    for session_id in session_ids {
                        self.send_to_session(
                            session_id,
                            ChangeNotification {
                                conversation_id: msg.conversation_id,
                                change: msg.change.clone(),
                            },
                        );
                        sent_count += 1;
                    }
                }
            }

            tracing::debug!(
                "Published change to room {}: {} sessions",
                msg.conversation_id,
                sent_count
            );
        } else {
            tracing::debug!(
                "Change for conversation {} with no open feeds, dropped",
                msg.conversation_id
            );
        }
    }
}

impl Default for RealtimeServer {
    fn default() -> Self {
        Self::new()
    }
}
