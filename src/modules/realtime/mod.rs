/// Realtime Module
///
/// Change-feed delivery for open conversation views over WebSocket:
///
/// - Client/server event protocol (`message.rs`)
/// - Server actor tracking sessions, users and conversation rooms (`server.rs`)
/// - Session actor holding one feed per subscribed conversation (`session.rs`)
/// - Merge/dedup bridge state and typed change events (`feed.rs`)
/// - HTTP upgrade handler bridging the WebSocket stream (`handler.rs`)
pub mod events;
pub mod feed;
pub mod handler;
pub mod message;
pub mod server;
pub mod session;
