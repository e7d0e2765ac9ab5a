//! Advisory display-name cache over the `users` collection.
//!
//! Names are only used for presentation. A lookup that fails falls back to
//! the raw user id and is retried on the next call.

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    domain::message::Message,
    store::{DocumentStore, USERS},
};

const DISPLAY_NAME_LOOKUP_FAILED: &str = "CHAT_DISPLAY_NAME_LOOKUP_FAILED";

#[derive(Debug, Default)]
pub struct NameCache {
    names: HashMap<String, String>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, user_id: &str) -> Option<&str> {
        self.names.get(user_id.trim()).map(String::as_str)
    }

    /// Records a name learned elsewhere, e.g. the sender name carried on a message.
    pub fn remember(&mut self, user_id: &str, name: &str) {
        let (user_id, name) = (user_id.trim(), name.trim());
        if !user_id.is_empty() && !name.is_empty() {
            self.names.insert(user_id.to_owned(), name.to_owned());
        }
    }

    /// Seeds the cache from the sender names of `messages`.
    pub fn remember_senders(&mut self, messages: &[Message]) {
        for message in messages {
            if let Some(name) = &message.sender_name {
                self.remember(&message.sender_id, name);
            }
        }
    }

    /// Returns the display name of `user_id`, reading the user record on a
    /// cache miss. Falls back to the id itself.
    pub fn resolve(&mut self, store: &dyn DocumentStore, user_id: &str) -> String {
        let user_id = user_id.trim();
        if let Some(name) = self.names.get(user_id) {
            return name.clone();
        }
        if user_id.is_empty() {
            return String::new();
        }

        match store.get(USERS, user_id) {
            Ok(Some(doc)) => {
                let name = doc
                    .get("display_name")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|name| !name.is_empty());
                match name {
                    Some(name) => {
                        self.names.insert(user_id.to_owned(), name.to_owned());
                        name.to_owned()
                    }
                    None => user_id.to_owned(),
                }
            }
            Ok(None) => user_id.to_owned(),
            Err(error) => {
                tracing::debug!(
                    code = DISPLAY_NAME_LOOKUP_FAILED,
                    user_id,
                    error = %error,
                    "display name lookup failed"
                );
                user_id.to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        store::{InMemoryStore, StoreError},
        test_support::fields,
    };

    #[test]
    fn resolves_and_caches_display_name() {
        let store = InMemoryStore::new();
        store
            .set(USERS, "u1", fields(json!({"display_name": " Alice "})))
            .expect("seed user");
        let mut cache = NameCache::new();

        assert_eq!(cache.resolve(&store, "u1"), "Alice");
        store.delete(USERS, "u1").expect("remove user");
        assert_eq!(cache.resolve(&store, " u1 "), "Alice");
    }

    #[test]
    fn falls_back_to_id_for_unknown_user() {
        let store = InMemoryStore::new();
        let mut cache = NameCache::new();

        assert_eq!(cache.resolve(&store, "ghost"), "ghost");
        assert_eq!(cache.cached("ghost"), None);
    }

    #[test]
    fn failed_lookup_is_retried() {
        let store = InMemoryStore::new();
        store
            .set(USERS, "u1", fields(json!({"display_name": "Alice"})))
            .expect("seed user");
        store.fail_next_read(USERS, StoreError::Unavailable("offline".to_owned()));
        let mut cache = NameCache::new();

        assert_eq!(cache.resolve(&store, "u1"), "u1");
        assert_eq!(cache.resolve(&store, "u1"), "Alice");
    }

    #[test]
    fn remembers_sender_names_from_messages() {
        let mut cache = NameCache::new();
        cache.remember("u2", "  ");
        cache.remember(" u3 ", "Carol");

        assert_eq!(cache.cached("u2"), None);
        assert_eq!(cache.cached("u3"), Some("Carol"));
    }
}
