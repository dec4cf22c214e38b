/// Realtime Session Actor
///
/// One actor per WebSocket connection. The session owns a `ThreadFeed` per
/// subscribed conversation and runs the bridge semantics: an insert
/// notification triggers a bounded re-fetch of that row, merged by id into
/// the held feed; foreign-authored arrivals are acknowledged with a read
/// receipt while the feed is open. Feeds die with the subscription or the
/// actor, whichever comes first.
///
/// Async work (DB calls through the services) runs via `ctx.spawn()` +
/// `into_actor()`; results are applied back onto actor state in `.map()`,
/// guarded by the feed's subscription epoch so a stale fetch cannot
/// overwrite a newer subscription.
use actix::prelude::*;
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::modules::conversation::handle::ConversationSvc;
use crate::modules::message::handle::MessageSvc;
use crate::utils::Claims;
use crate::ENV;

use super::events::*;
use super::feed::{ChangeEvent, ConnectionState, ThreadFeed};
use super::message::{ClientEvent, ServerEvent};
use super::server::RealtimeServer;

/// Page size of the snapshot loaded when a subscription opens.
const INITIAL_PAGE_SIZE: i64 = 50;

/// Service handles a session needs; bundled so the actor can hand clones
/// into spawned futures.
#[derive(Clone)]
pub struct SessionServices {
    pub messages: actix_web::web::Data<MessageSvc>,
    pub conversations: actix_web::web::Data<ConversationSvc>,
}

pub struct RealtimeSession {
    pub id: Uuid,

    /// Set once the bearer token has been verified.
    pub user_id: Option<Uuid>,

    pub server: Addr<RealtimeServer>,

    /// Outbound JSON to the client (bridged to the WebSocket in handler.rs).
    pub tx: mpsc::UnboundedSender<String>,

    /// None in test environments without a database.
    pub services: Option<SessionServices>,

    /// One feed per subscribed conversation.
    feeds: HashMap<Uuid, ThreadFeed>,

    /// Monotonic subscription counter backing the stale-fetch guard.
    next_epoch: u64,
}

impl RealtimeSession {
    pub fn new(
        server: Addr<RealtimeServer>,
        tx: mpsc::UnboundedSender<String>,
        services: SessionServices,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: None,
            server,
            tx,
            services: Some(services),
            feeds: HashMap::new(),
            next_epoch: 0,
        }
    }

    fn send_to_client(&self, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(json) => {
                if let Err(e) = self.tx.send(json) {
                    tracing::error!("Could not push event to client (session {}): {}", self.id, e);
                }
            }
            Err(e) => {
                tracing::error!("Could not serialize ServerEvent (session {}): {}", self.id, e);
            }
        }
    }

    fn send_error(&self, message: &str) {
        self.send_to_client(&ServerEvent::Error { message: message.to_string() });
    }

    fn require_auth(&self) -> Option<Uuid> {
        if self.user_id.is_none() {
            self.send_error("You must authenticate before performing this action");
            tracing::warn!("Session {} not authenticated, request refused", self.id);
        }
        self.user_id
    }

    fn handle_client_event(&mut self, event: &ClientEvent, ctx: &mut Context<Self>) {
        match event {
            ClientEvent::Auth { token } => {
                self.handle_auth(token);
            }

            ClientEvent::Subscribe { conversation_id } => {
                self.handle_subscribe(*conversation_id, ctx);
            }

            ClientEvent::Unsubscribe { conversation_id } => {
                self.handle_unsubscribe(*conversation_id);
            }

            ClientEvent::SendMessage { conversation_id, content } => {
                self.handle_send_message(*conversation_id, content.clone(), ctx);
            }

            ClientEvent::Ping => {
                self.send_to_client(&ServerEvent::Pong);
            }
        }
    }

    fn handle_auth(&mut self, token: &str) {
        if self.user_id.is_some() {
            self.send_error("Session is already authenticated");
            return;
        }

        let claims = match Claims::decode(token, ENV.jwt_secret.as_ref()) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("Token verification failed (session {}): {}", self.id, e);
                self.send_to_client(&ServerEvent::AuthFailed {
                    reason: "Token invalid or expired".to_string(),
                });
                return;
            }
        };

        let user_id = claims.sub;

        self.user_id = Some(user_id);
        self.server.do_send(Authenticate { session_id: self.id, user_id });
        self.send_to_client(&ServerEvent::AuthSuccess { user_id });

        tracing::info!("User {} authenticated on session {}", user_id, self.id);
    }

    /// Opens a feed: verify active membership, load the newest page, mark it
    /// read (viewing the thread acknowledges it), then join the room.
    fn handle_subscribe(&mut self, conversation_id: Uuid, ctx: &mut Context<Self>) {
        let Some(user_id) = self.require_auth() else {
            return;
        };

        let Some(services) = self.services.clone() else {
            self.send_error("Realtime services unavailable");
            return;
        };

        self.next_epoch += 1;
        let epoch = self.next_epoch;

        // A re-subscribe supersedes any previous feed for the conversation.
        self.feeds.insert(conversation_id, ThreadFeed::new(conversation_id, epoch));
        self.send_to_client(&ServerEvent::SubscriptionState {
            conversation_id,
            state: ConnectionState::Connecting,
        });

        ctx.spawn(
            async move {
                match services.conversations.is_active_participant(&conversation_id, &user_id).await
                {
                    Ok(true) => {}
                    Ok(false) => return (epoch, None),
                    Err(e) => {
                        tracing::error!(
                            "Membership check failed (conversation {}): {}",
                            conversation_id,
                            e
                        );
                        return (epoch, None);
                    }
                }

                match services
                    .messages
                    .fetch_page(conversation_id, Some(INITIAL_PAGE_SIZE), Some(0))
                    .await
                {
                    Ok(messages) => {
                        // Read-on-open: the newest loaded message is
                        // acknowledged and the pointer advanced.
                        if let Some(newest) = messages.last() {
                            let newest_id = newest.message.id;
                            if let Err(e) = services.messages.mark_read(newest_id, user_id).await {
                                tracing::warn!("Read receipt on open failed: {}", e);
                            }
                            if let Err(e) = services
                                .conversations
                                .mark_read(conversation_id, user_id, newest_id)
                                .await
                            {
                                tracing::warn!("Read pointer on open failed: {}", e);
                            }
                        }
                        (epoch, Some(messages))
                    }
                    Err(e) => {
                        tracing::error!(
                            "Snapshot load failed (conversation {}): {}",
                            conversation_id,
                            e
                        );
                        (epoch, None)
                    }
                }
            }
            .into_actor(self)
            .map(move |(epoch, result), act, _ctx| {
                // Apply only onto the feed that started this fetch; a
                // superseded subscription drops the stale page.
                let outcome = match act.feeds.get_mut(&conversation_id) {
                    Some(feed) if feed.epoch == epoch => match result {
                        Some(messages) => {
                            feed.load(messages);
                            tracing::debug!(
                                "Feed for conversation {} loaded with {} messages",
                                conversation_id,
                                feed.len()
                            );
                            Some(Some(feed.messages().to_vec()))
                        }
                        None => Some(None),
                    },
                    _ => None,
                };

                match outcome {
                    Some(Some(snapshot)) => {
                        act.server.do_send(JoinRoom { user_id, conversation_id });
                        act.send_to_client(&ServerEvent::Snapshot {
                            conversation_id,
                            messages: snapshot,
                        });
                        act.send_to_client(&ServerEvent::SubscriptionState {
                            conversation_id,
                            state: ConnectionState::Connected,
                        });
                    }
                    Some(None) => {
                        act.feeds.remove(&conversation_id);
                        act.send_to_client(&ServerEvent::SubscriptionState {
                            conversation_id,
                            state: ConnectionState::Disconnected,
                        });
                        act.send_error("Unable to open conversation");
                    }
                    None => {}
                }
            }),
        );
    }

    fn handle_unsubscribe(&mut self, conversation_id: Uuid) {
        if self.feeds.remove(&conversation_id).is_none() {
            return;
        }

        if let Some(user_id) = self.user_id {
            self.server.do_send(LeaveRoom { user_id, conversation_id });
        }

        self.send_to_client(&ServerEvent::SubscriptionState {
            conversation_id,
            state: ConnectionState::Disconnected,
        });
    }

    /// Local-origin send: the response row is authoritative, so it is
    /// appended to the feed directly; the change-feed echo dedupes later.
    fn handle_send_message(
        &mut self,
        conversation_id: Uuid,
        content: String,
        ctx: &mut Context<Self>,
    ) {
        let Some(user_id) = self.require_auth() else {
            return;
        };

        let Some(services) = self.services.clone() else {
            self.send_error("Realtime services unavailable");
            return;
        };

        let session_id = self.id;

        ctx.spawn(
            async move { services.messages.send(conversation_id, user_id, content, Vec::new()).await }
                .into_actor(self)
                .map(move |result, act, _ctx| match result {
                    Ok(message) => {
                        if let Some(feed) = act.feeds.get_mut(&conversation_id) {
                            feed.append_local(message.clone());
                        }
                        act.send_to_client(&ServerEvent::MessageNew { conversation_id, message });
                    }
                    Err(e) => {
                        tracing::error!(
                            "Send failed (session {}, conversation {}): {}",
                            session_id,
                            conversation_id,
                            e
                        );
                        act.send_error("Unable to send message. Please try again.");
                    }
                }),
        );
    }

    /// Remote-origin merge: the notification names a row; the row itself is
    /// re-fetched with a bounded query and merged by id.
    fn handle_inserted(&mut self, conversation_id: Uuid, message_id: Uuid, ctx: &mut Context<Self>) {
        let Some(user_id) = self.user_id else {
            return;
        };

        let Some(feed) = self.feeds.get(&conversation_id) else {
            return;
        };

        // Duplicate delivery, or our own local append already holds it.
        if feed.contains(&message_id) {
            return;
        }
        let epoch = feed.epoch;

        let Some(services) = self.services.clone() else {
            return;
        };

        ctx.spawn(
            async move {
                let fetched = match services
                    .messages
                    .fetch_one_with_relations(conversation_id, message_id)
                    .await
                {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        tracing::error!("Re-fetch of announced row {} failed: {}", message_id, e);
                        None
                    }
                };

                // Having the thread open acknowledges foreign messages.
                if let Some(message) = &fetched {
                    if message.message.user_id != user_id {
                        if let Err(e) = services.messages.mark_read(message_id, user_id).await {
                            tracing::warn!("Read receipt for arrival failed: {}", e);
                        }
                    }
                }

                (epoch, fetched)
            }
            .into_actor(self)
            .map(move |(epoch, fetched), act, _ctx| {
                // A row deleted between notification and fetch stays absent.
                let merged = {
                    let Some(feed) = act.feeds.get_mut(&conversation_id) else {
                        return;
                    };
                    if feed.epoch != epoch {
                        return;
                    }
                    match fetched {
                        Some(message) => {
                            if feed.merge_remote(message.clone()) {
                                Some(message)
                            } else {
                                None
                            }
                        }
                        None => None,
                    }
                };

                if let Some(message) = merged {
                    act.send_to_client(&ServerEvent::MessageNew { conversation_id, message });
                }
            }),
        );
    }
}

impl Actor for RealtimeSession {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!("Realtime session started: {}", self.id);

        self.server.do_send(Connect { id: self.id, addr: ctx.address() });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!("Realtime session stopped: {}", self.id);

        // Feeds drop with the actor; the server prunes room membership.
        self.server.do_send(Disconnect { id: self.id });
    }
}

impl Message for ClientEvent {
    type Result = ();
}

/// Client frames parsed in handler.rs are dispatched here.
impl Handler<ClientEvent> for RealtimeSession {
    type Result = ();

    fn handle(&mut self, msg: ClientEvent, ctx: &mut Context<Self>) {
        self.handle_client_event(&msg, ctx);
    }
}

/// Change-feed events routed by the server actor.
impl Handler<ChangeNotification> for RealtimeSession {
    type Result = ();

    fn handle(&mut self, msg: ChangeNotification, ctx: &mut Context<Self>) {
        let conversation_id = msg.conversation_id;

        match msg.change {
            ChangeEvent::MessageInserted { message_id } => {
                self.handle_inserted(conversation_id, message_id, ctx);
            }

            ChangeEvent::MessageDeleted { message_id } => {
                let subscribed = match self.feeds.get_mut(&conversation_id) {
                    Some(feed) => {
                        feed.remove(&message_id);
                        true
                    }
                    None => false,
                };

                if subscribed {
                    self.send_to_client(&ServerEvent::MessageDeleted {
                        conversation_id,
                        message_id,
                    });
                }
            }

            ChangeEvent::ReceiptUpserted { message_id, user_id } => {
                let subscribed = match self.feeds.get_mut(&conversation_id) {
                    Some(feed) => {
                        feed.apply_receipt(&message_id, user_id, chrono::Utc::now());
                        true
                    }
                    None => false,
                };

                if subscribed {
                    self.send_to_client(&ServerEvent::ReceiptUpserted {
                        conversation_id,
                        message_id,
                        user_id,
                    });
                }
            }
        }
    }
}
