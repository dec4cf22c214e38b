use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::modules::message::model::MessageWithRelations;

/// Typed change-feed event. Carries row references only: consumers re-fetch
/// the row instead of trusting a pushed payload.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    MessageInserted { message_id: Uuid },
    MessageDeleted { message_id: Uuid },
    ReceiptUpserted { message_id: Uuid, user_id: Uuid },
}

/// Subscription state surfaced to the client for its status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Client-held view of one conversation's timeline.
///
/// Two merge paths: `append_local` for rows this session produced itself,
/// `merge_remote` for rows re-fetched after a change-feed notification. Both
/// are idempotent by message id, since the transport does not guarantee
/// at-most-once delivery. `epoch` ties async fetch results to the
/// subscription that started them; a stale result must not touch a newer
/// feed.
#[derive(Debug, Clone)]
pub struct ThreadFeed {
    pub conversation_id: Uuid,
    pub epoch: u64,
    pub state: ConnectionState,
    messages: Vec<MessageWithRelations>,
}

impl ThreadFeed {
    pub fn new(conversation_id: Uuid, epoch: u64) -> Self {
        Self { conversation_id, epoch, state: ConnectionState::Connecting, messages: Vec::new() }
    }

    /// Replaces the held list with an initial page: sorted ascending by
    /// creation time, duplicates by id dropped.
    pub fn load(&mut self, mut messages: Vec<MessageWithRelations>) {
        messages.sort_by(|a, b| ordering_key(a).cmp(&ordering_key(b)));
        self.messages.clear();
        for message in messages {
            if !self.contains(&message.message.id) {
                self.messages.push(message);
            }
        }
        self.state = ConnectionState::Connected;
    }

    pub fn contains(&self, message_id: &Uuid) -> bool {
        self.messages.iter().any(|m| m.message.id == *message_id)
    }

    /// Remote-origin merge: skipped when the id is already held, otherwise
    /// inserted at its timestamp position.
    pub fn merge_remote(&mut self, message: MessageWithRelations) -> bool {
        if self.contains(&message.message.id) {
            return false;
        }

        let key = ordering_key(&message);
        let position = self
            .messages
            .iter()
            .rposition(|held| ordering_key(held) <= key)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.messages.insert(position, message);
        true
    }

    /// Local-origin path: this session already holds the authoritative row
    /// from its own send, so it is appended without a re-fetch. The later
    /// change-feed echo dedupes against it.
    pub fn append_local(&mut self, message: MessageWithRelations) -> bool {
        if self.contains(&message.message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Hard deletes leave no tombstone; the entry just disappears.
    pub fn remove(&mut self, message_id: &Uuid) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.message.id != *message_id);
        self.messages.len() != before
    }

    /// Upserts a receipt on the held copy of the message.
    pub fn apply_receipt(
        &mut self,
        message_id: &Uuid,
        user_id: Uuid,
        read_at: chrono::DateTime<chrono::Utc>,
    ) -> bool {
        let Some(message) = self.messages.iter_mut().find(|m| m.message.id == *message_id) else {
            return false;
        };

        match message.read_receipts.iter_mut().find(|r| r.user_id == user_id) {
            Some(receipt) => receipt.read_at = read_at,
            None => message.read_receipts.push(
                crate::modules::message::schema::ReadReceiptEntity {
                    message_id: *message_id,
                    user_id,
                    read_at,
                },
            ),
        }

        true
    }

    pub fn messages(&self) -> &[MessageWithRelations] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn ordering_key(message: &MessageWithRelations) -> (chrono::DateTime<chrono::Utc>, Uuid) {
    (message.message.created_at, message.message.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::message::schema::MessageEntity;

    fn message(seconds: i64, content: &str) -> MessageWithRelations {
        let created_at = chrono::DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap();
        MessageWithRelations::bare(MessageEntity {
            id: Uuid::now_v7(),
            conversation_id: Uuid::nil(),
            user_id: Uuid::now_v7(),
            content: content.to_string(),
            is_system: false,
            metadata: None,
            created_at,
            updated_at: created_at,
        })
    }

    #[test]
    fn merge_remote_dedupes_by_id() {
        let mut feed = ThreadFeed::new(Uuid::now_v7(), 1);
        let m = message(0, "hello");

        assert!(feed.merge_remote(m.clone()));
        assert!(!feed.merge_remote(m));
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn merge_remote_inserts_in_timestamp_order() {
        let mut feed = ThreadFeed::new(Uuid::now_v7(), 1);
        let early = message(0, "early");
        let late = message(10, "late");

        // Delivery order is not creation order.
        feed.merge_remote(late.clone());
        feed.merge_remote(early.clone());

        assert_eq!(feed.messages()[0].message.id, early.message.id);
        assert_eq!(feed.messages()[1].message.id, late.message.id);
    }

    #[test]
    fn local_append_then_remote_echo_yields_one_entry() {
        let mut feed = ThreadFeed::new(Uuid::now_v7(), 1);
        let m = message(0, "mine");

        assert!(feed.append_local(m.clone()));
        // The change feed echoes the same row back to the sender.
        assert!(!feed.merge_remote(m));
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn load_sorts_and_dedupes() {
        let mut feed = ThreadFeed::new(Uuid::now_v7(), 1);
        let a = message(5, "a");
        let b = message(1, "b");

        feed.load(vec![a.clone(), b.clone(), a.clone()]);

        assert_eq!(feed.len(), 2);
        assert_eq!(feed.messages()[0].message.id, b.message.id);
        assert_eq!(feed.state, ConnectionState::Connected);
    }

    #[test]
    fn remove_drops_entry_without_tombstone() {
        let mut feed = ThreadFeed::new(Uuid::now_v7(), 1);
        let m = message(0, "gone");
        feed.merge_remote(m.clone());

        assert!(feed.remove(&m.message.id));
        assert!(!feed.remove(&m.message.id));
        assert!(feed.is_empty());
    }

    #[test]
    fn apply_receipt_upserts_per_user() {
        let mut feed = ThreadFeed::new(Uuid::now_v7(), 1);
        let m = message(0, "seen");
        let id = m.message.id;
        feed.merge_remote(m);

        let reader = Uuid::now_v7();
        let first = chrono::Utc::now();
        let later = first + chrono::Duration::seconds(30);

        assert!(feed.apply_receipt(&id, reader, first));
        assert!(feed.apply_receipt(&id, reader, later));

        let receipts = &feed.messages()[0].read_receipts;
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].read_at, later);
    }

    #[test]
    fn new_feed_starts_connecting() {
        let feed = ThreadFeed::new(Uuid::now_v7(), 1);
        assert_eq!(feed.state, ConnectionState::Connecting);
        assert!(feed.is_empty());
    }
}
