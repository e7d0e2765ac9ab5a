//! In-memory [`DocumentStore`] with live query listeners.
//!
//! Every write re-runs the queries registered on the written collection and
//! notifies each listener whose result set changed. Notifications for one
//! write are delivered before the next write starts delivering, so each
//! listener observes batches in write order.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use super::{
    contract::{DocumentStore, ListenerRegistration, SnapshotListener, SnapshotResult},
    document::{merge_fields, Document, Fields},
    error::{StoreError, StoreResult},
    query::Query,
};

const STORE_LOCK_POISONED: &str = "STORE_LOCK_POISONED";

pub type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

type Callback = Arc<dyn Fn(SnapshotResult) + Send + Sync>;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    dispatch: Mutex<()>,
    next_listener_id: AtomicU64,
}

#[derive(Default)]
struct State {
    collections: Collections,
    listeners: Vec<ListenerEntry>,
    write_failures: BTreeMap<String, VecDeque<StoreError>>,
    read_failures: BTreeMap<String, VecDeque<StoreError>>,
}

struct ListenerEntry {
    id: u64,
    query: Query,
    callback: Callback,
    last_delivered: Option<Vec<Document>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_collections(collections: Collections) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.inner.state.lock() {
            state.collections = collections;
        }
        store
    }

    /// Returns a copy of every stored document, grouped by collection.
    pub fn export(&self) -> StoreResult<Collections> {
        Ok(self.lock_state()?.collections.clone())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn listener_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|state| state.listeners.len())
            .unwrap_or(0)
    }

    /// Makes the next write to `collection` fail with `error`.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn fail_next_write(&self, collection: &str, error: StoreError) {
        if let Ok(mut state) = self.inner.state.lock() {
            state
                .write_failures
                .entry(collection.to_owned())
                .or_default()
                .push_back(error);
        }
    }

    /// Makes the next read of `collection` fail with `error`.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn fail_next_read(&self, collection: &str, error: StoreError) {
        if let Ok(mut state) = self.inner.state.lock() {
            state
                .read_failures
                .entry(collection.to_owned())
                .or_default()
                .push_back(error);
        }
    }

    /// Reports `error` to every listener on `collection`.
    ///
    /// Listeners stay registered and receive the full result set again on the
    /// next write, even if it did not change.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn fail_listeners(&self, collection: &str, error: StoreError) {
        let Ok(_dispatch) = self.inner.dispatch.lock() else {
            return;
        };

        let callbacks: Vec<Callback> = match self.inner.state.lock() {
            Ok(mut state) => state
                .listeners
                .iter_mut()
                .filter(|entry| entry.query.collection_name() == collection)
                .map(|entry| {
                    entry.last_delivered = None;
                    Arc::clone(&entry.callback)
                })
                .collect(),
            Err(_) => return,
        };

        for callback in callbacks {
            callback(Err(error.clone()));
        }
    }

    fn lock_state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.inner.state.lock().map_err(|_| {
            tracing::error!(code = STORE_LOCK_POISONED, "in-memory store state lock poisoned");
            StoreError::Unavailable("store state lock poisoned".to_owned())
        })
    }

    fn read<T, F>(&self, collection: &str, read: F) -> StoreResult<T>
    where
        F: FnOnce(Option<&BTreeMap<String, Fields>>) -> T,
    {
        let mut state = self.lock_state()?;
        if let Some(error) = take_failure(&mut state.read_failures, collection) {
            return Err(error);
        }

        Ok(read(state.collections.get(collection)))
    }

    fn write<F>(&self, collection: &str, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, Fields>) -> StoreResult<()>,
    {
        let _dispatch = self
            .inner
            .dispatch
            .lock()
            .map_err(|_| StoreError::Unavailable("store dispatch lock poisoned".to_owned()))?;

        let deliveries = {
            let mut state = self.lock_state()?;
            if let Some(error) = take_failure(&mut state.write_failures, collection) {
                return Err(error);
            }

            let State {
                collections,
                listeners,
                ..
            } = &mut *state;
            let docs = collections.entry(collection.to_owned()).or_default();
            mutate(docs)?;

            let docs = collections.get(collection);
            changed_snapshots(listeners, collection, docs)
        };

        for (callback, snapshot) in deliveries {
            callback(Ok(snapshot));
        }

        Ok(())
    }
}

impl DocumentStore for InMemoryStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        self.read(collection, |docs| {
            docs.and_then(|docs| docs.get(id))
                .map(|fields| Document::new(id, fields.clone()))
        })
    }

    fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.read(query.collection_name(), |docs| evaluate(query, docs))
    }

    fn set(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.write(collection, |docs| {
            docs.insert(id.to_owned(), fields);
            Ok(())
        })
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> StoreResult<()> {
        self.write(collection, |docs| match docs.get_mut(id) {
            Some(existing) => {
                merge_fields(existing, fields);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: collection.to_owned(),
                id: id.to_owned(),
            }),
        })
    }

    fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.write(collection, |docs| {
            docs.remove(id);
            Ok(())
        })
    }

    fn listen(&self, query: Query, listener: SnapshotListener) -> ListenerRegistration {
        let callback: Callback = Arc::from(listener);
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);

        let Ok(_dispatch) = self.inner.dispatch.lock() else {
            callback(Err(StoreError::Unavailable(
                "store dispatch lock poisoned".to_owned(),
            )));
            return ListenerRegistration::new(|| {});
        };

        let initial = match self.lock_state() {
            Ok(mut state) => {
                let collection = query.collection_name().to_owned();
                match take_failure(&mut state.read_failures, &collection) {
                    Some(error) => {
                        state.listeners.push(ListenerEntry {
                            id,
                            query,
                            callback: Arc::clone(&callback),
                            last_delivered: None,
                        });
                        Err(error)
                    }
                    None => {
                        let snapshot = evaluate(&query, state.collections.get(&collection));
                        state.listeners.push(ListenerEntry {
                            id,
                            query,
                            callback: Arc::clone(&callback),
                            last_delivered: Some(snapshot.clone()),
                        });
                        Ok(snapshot)
                    }
                }
            }
            Err(error) => Err(error),
        };

        callback(initial);
        tracing::debug!(listener_id = id, "in-memory store listener attached");

        let inner = Arc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            if let Some(inner) = inner.upgrade() {
                if let Ok(mut state) = inner.state.lock() {
                    state.listeners.retain(|entry| entry.id != id);
                }
            }
            tracing::debug!(listener_id = id, "in-memory store listener detached");
        })
    }
}

fn take_failure(
    failures: &mut BTreeMap<String, VecDeque<StoreError>>,
    collection: &str,
) -> Option<StoreError> {
    failures.get_mut(collection).and_then(VecDeque::pop_front)
}

fn evaluate(query: &Query, docs: Option<&BTreeMap<String, Fields>>) -> Vec<Document> {
    let Some(docs) = docs else {
        return Vec::new();
    };

    let docs: Vec<Document> = docs
        .iter()
        .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
        .collect();
    query.evaluate(&docs)
}

fn changed_snapshots(
    listeners: &mut [ListenerEntry],
    collection: &str,
    docs: Option<&BTreeMap<String, Fields>>,
) -> Vec<(Callback, Vec<Document>)> {
    listeners
        .iter_mut()
        .filter(|entry| entry.query.collection_name() == collection)
        .filter_map(|entry| {
            let snapshot = evaluate(&entry.query, docs);
            if entry.last_delivered.as_ref() == Some(&snapshot) {
                return None;
            }
            entry.last_delivered = Some(snapshot.clone());
            Some((Arc::clone(&entry.callback), snapshot))
        })
        .collect()
}
