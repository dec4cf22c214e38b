/// WebSocket HTTP Handler
///
/// Upgrades the HTTP request and bridges the bidirectional flow:
/// - Inbound:  client frame -> parsed ClientEvent -> session actor
/// - Outbound: server/session actor -> mpsc channel -> WebSocket frame
use actix::{Actor, Addr};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use tokio::sync::mpsc;

use crate::modules::conversation::handle::ConversationSvc;
use crate::modules::message::handle::MessageSvc;

use super::message::ClientEvent;
use super::server::RealtimeServer;
use super::session::{RealtimeSession, SessionServices};

/// Endpoint: GET /ws
///
/// Authentication happens in-band with a `ClientEvent::Auth` frame, not with
/// the HTTP middleware, so the route sits outside the `/api` scope.
pub async fn realtime_handler(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Addr<RealtimeServer>>,
    message_service: web::Data<MessageSvc>,
    conversation_service: web::Data<ConversationSvc>,
) -> Result<HttpResponse, Error> {
    tracing::debug!("WebSocket upgrade request from {:?}", req.peer_addr());

    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    // Outbound channel: session actor -> spawned task -> WebSocket frame.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let session = RealtimeSession::new(
        server.get_ref().clone(),
        tx,
        SessionServices { messages: message_service, conversations: conversation_service },
    );

    let addr = session.start();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                // === INBOUND: client -> server ===
                msg = msg_stream.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let text_str = text.to_string();

                            match serde_json::from_str::<ClientEvent>(&text_str) {
                                Ok(client_event) => {
                                    addr.do_send(client_event);
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        "Could not parse client event: {} - raw: {}",
                                        e,
                                        &text_str[..100.min(text_str.len())]
                                    );
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_session.pong(&data).await {
                                tracing::error!("Could not send pong: {}", e);
                                break;
                            }
                        }

                        Some(Ok(Message::Pong(_))) => {
                            // heartbeat response, nothing to do
                        }

                        Some(Ok(Message::Close(reason))) => {
                            tracing::info!("WebSocket close frame: {:?}", reason);
                            break;
                        }

                        Some(Ok(Message::Binary(_))) => {
                            tracing::warn!("Binary frames are not supported");
                        }

                        Some(Ok(Message::Continuation(_) | Message::Nop)) => {}

                        Some(Err(e)) => {
                            tracing::error!("WebSocket protocol error: {}", e);
                            break;
                        }

                        // stream ended (client disconnect)
                        None => break,
                    }
                }

                // === OUTBOUND: server -> client ===
                Some(json) = rx.recv() => {
                    if ws_session.text(json).await.is_err() {
                        tracing::error!("Could not push frame to WebSocket client");
                        break;
                    }
                }
            }
        }

        // Closing the stream stops the session actor, which unsubscribes
        // every open feed via Disconnect.
        let _ = ws_session.close(None).await;
        tracing::debug!("WebSocket message loop finished");
    });

    tracing::info!("WebSocket connection established");
    Ok(response)
}
