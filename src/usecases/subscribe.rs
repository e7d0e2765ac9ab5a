//! Live subscriptions over the document store.
//!
//! Each subscription owns its own store listener and channel. Emissions start
//! with `Loading`, followed by one `Success` or `Error` per change batch.
//! Store failures never close the subscription; only `cancel` or drop does.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    time::Duration,
};

use super::{error::map_store_error, load_messages::normalized_message_limit};
use crate::{
    domain::{chat::Chat, message::Message, resource::Resource},
    store::{
        normalize::{decode_chats, decode_messages},
        Direction, Document, DocumentStore, ListenerRegistration, Query, SnapshotListener, CHATS,
        MESSAGES,
    },
};

const SUBSCRIPTION_BATCH_FAILED: &str = "CHAT_SUBSCRIPTION_BATCH_FAILED";

/// Cancellable sequence of emissions from one live query.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::Receiver<Resource<T>>,
    cancelled: Arc<AtomicBool>,
    registration: ListenerRegistration,
}

impl<T> Subscription<T> {
    /// Returns the next buffered emission without blocking.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn try_next(&self) -> Option<Resource<T>> {
        if self.is_cancelled() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    /// Waits up to `timeout` for the next emission.
    pub fn next_timeout(&self, timeout: Duration) -> Option<Resource<T>> {
        if self.is_cancelled() {
            return None;
        }
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Detaches the store listener. Buffered emissions are discarded and
    /// calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.registration.remove();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Blocks until the next emission. Ends after cancellation.
impl<T> Iterator for Subscription<T> {
    type Item = Resource<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_cancelled() {
            return None;
        }
        self.receiver.recv().ok()
    }
}

/// Streams the messages of `chat_id`, oldest first, keeping the `limit` most
/// recent ones.
pub fn subscribe_messages(
    store: &dyn DocumentStore,
    chat_id: &str,
    limit: usize,
) -> Subscription<Vec<Message>> {
    let query = Query::collection(MESSAGES)
        .where_eq("chat_id", chat_id.trim())
        .order_by("sent_at", Direction::Ascending)
        .limit_to_last(normalized_message_limit(limit));

    subscribe(store, query, |docs| {
        let mut messages = decode_messages(docs);
        messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        messages
    })
}

/// Streams the chats `participant_id` belongs to, most recently updated first.
pub fn subscribe_chats(store: &dyn DocumentStore, participant_id: &str) -> Subscription<Vec<Chat>> {
    let query = Query::collection(CHATS)
        .where_array_contains("participants", participant_id.trim())
        .order_by("updated_at", Direction::Descending);

    subscribe(store, query, decode_chats_by_recency)
}

/// Streams the chats attached to `project_id`, most recently updated first.
pub fn subscribe_project_chats(
    store: &dyn DocumentStore,
    project_id: &str,
) -> Subscription<Vec<Chat>> {
    let query = Query::collection(CHATS)
        .where_eq("project_id", project_id.trim())
        .order_by("updated_at", Direction::Descending);

    subscribe(store, query, decode_chats_by_recency)
}

fn decode_chats_by_recency(docs: &[Document]) -> Vec<Chat> {
    let mut chats = decode_chats(docs);
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    chats
}

fn subscribe<T, F>(store: &dyn DocumentStore, query: Query, decode: F) -> Subscription<T>
where
    T: Send + 'static,
    F: Fn(&[Document]) -> T + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel();
    let cancelled = Arc::new(AtomicBool::new(false));
    let _ = tx.send(Resource::Loading);

    let collection = query.collection_name().to_owned();
    let listener_cancelled = Arc::clone(&cancelled);
    let listener: SnapshotListener = Box::new(move |result| {
        if listener_cancelled.load(Ordering::SeqCst) {
            return;
        }

        let emission = match result {
            Ok(docs) => Resource::Success(decode(&docs)),
            Err(error) => {
                tracing::warn!(
                    code = SUBSCRIPTION_BATCH_FAILED,
                    collection = %collection,
                    error = %error,
                    "live query reported a failure; subscription stays open"
                );
                Resource::Error(map_store_error(error).to_string())
            }
        };
        let _ = tx.send(emission);
    });

    let registration = store.listen(query, listener);

    Subscription {
        receiver: rx,
        cancelled,
        registration,
    }
}
