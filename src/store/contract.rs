use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use super::{
    document::{Document, Fields},
    error::StoreResult,
    query::Query,
};

pub type SnapshotResult = StoreResult<Vec<Document>>;

/// Callback receiving every result-set change of a live query.
///
/// Called from whatever thread performed the write. Implementations must not
/// write to the store from inside the callback.
pub type SnapshotListener = Box<dyn Fn(SnapshotResult) + Send + Sync>;

/// Remote document database as seen by the chat layer.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Creates or fully overwrites a document.
    fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    /// Merges `fields` into an existing document; dotted keys address nested
    /// map entries. Fails with `NotFound` when the document does not exist.
    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()>;

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Registers a live query. The listener receives the current result set
    /// and then every change to it until the registration is removed.
    fn listen(&self, query: Query, listener: SnapshotListener) -> ListenerRegistration;

    fn allocate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Handle detaching a live query listener.
///
/// Removal runs at most once, on [`ListenerRegistration::remove`] or on drop.
pub struct ListenerRegistration {
    removed: AtomicBool,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ListenerRegistration {
    pub fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            removed: AtomicBool::new(false),
            detach: Mutex::new(Some(Box::new(detach))),
        }
    }

    pub fn remove(&self) {
        if self.removed.swap(true, Ordering::SeqCst) {
            return;
        }

        let detach = match self.detach.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("removed", &self.is_removed())
            .finish()
    }
}
