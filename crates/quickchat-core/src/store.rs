//! Append-only message history with live broadcast.

use std::sync::RwLock;

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::Message;

/// Live subscriber channel capacity.
const BROADCAST_CAPACITY: usize = 1024;

/// Message store with positional access and live updates.
///
/// Insertion order is arrival order; sequence indexes are assigned here and
/// are strictly increasing with no gaps. Messages are never removed. A
/// consumer attaching late can receive history first and then switch to live
/// updates via [`MessageStore::history_plus_stream`].
pub struct MessageStore {
    history: RwLock<Vec<Message>>,
    sender: broadcast::Sender<Message>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            history: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Record an arrived message, assigning the next sequence index.
    ///
    /// The message is visible to [`MessageStore::count`] and
    /// [`MessageStore::at`] before any live subscriber sees it.
    pub fn append(&self, author: impl Into<String>, body: impl Into<String>) -> Message {
        let mut history = self.history.write().unwrap();
        let message = Message {
            author: author.into(),
            body: body.into(),
            sequence_index: history.len() as u64,
        };
        history.push(message.clone());
        drop(history);

        let _ = self.sender.send(message.clone()); // live listeners
        message
    }

    /// Number of messages received so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.history.read().unwrap().len()
    }

    /// Positional access in arrival order.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<Message> {
        self.history.read().unwrap().get(index).cloned()
    }

    /// Snapshot of the full history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.history.read().unwrap().clone()
    }

    /// Receiver for live updates only.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    /// Stream that yields history first, then live updates.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, Message> {
        let (history, rx) = (self.snapshot(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_increasing_indexes() {
        let store = MessageStore::new();
        let a = store.append("alice", "hello");
        let b = store.append("bob", "hi");

        assert_eq!(a.sequence_index, 0);
        assert_eq!(b.sequence_index, 1);
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_positional_access_in_arrival_order() {
        let store = MessageStore::new();
        for i in 0..5 {
            store.append("alice", format!("msg {i}"));
        }

        assert_eq!(store.at(0).unwrap().body, "msg 0");
        assert_eq!(store.at(4).unwrap().body, "msg 4");
        assert!(store.at(5).is_none());
    }

    #[test]
    fn test_append_visible_before_broadcast() {
        let store = MessageStore::new();
        let mut rx = store.subscribe();

        store.append("alice", "hello");

        let live = rx.try_recv().unwrap();
        assert_eq!(live.body, "hello");
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_history_plus_stream_yields_history_then_live() {
        let store = MessageStore::new();
        store.append("alice", "old");

        let mut stream = store.history_plus_stream();
        assert_eq!(stream.next().await.unwrap().body, "old");

        store.append("bob", "new");
        assert_eq!(stream.next().await.unwrap().body, "new");
    }
}
