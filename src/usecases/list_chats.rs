//! Direct-chat deduplication and lookup.
//!
//! Two users can end up with several direct chat records, for example when
//! both start a conversation at the same time. The list shown to a user keeps
//! one direct chat per counterpart: the most recently updated one.

use std::collections::{btree_map::Entry, BTreeMap};

use super::{
    error::{map_store_error, ChatError},
    manage_chats::{create_chat, NewChat},
};
use crate::{
    domain::chat::{Chat, ChatKind},
    store::{normalize::decode_chats, DocumentStore, Query, CHATS},
};

const DIRECT_CHAT_UNRESOLVED: &str = "CHAT_DIRECT_COUNTERPART_UNRESOLVED";

/// Collapses direct chats sharing the same counterpart into the most recently
/// updated one. Other chats pass through. Result is ordered by update time,
/// newest first.
pub fn merge_direct_chats(chats: Vec<Chat>, current_user: &str) -> Vec<Chat> {
    let mut merged = Vec::with_capacity(chats.len());
    let mut latest_direct: BTreeMap<String, Chat> = BTreeMap::new();

    for chat in chats {
        if chat.kind != ChatKind::Direct {
            merged.push(chat);
            continue;
        }

        let Some(other) = chat.other_participant(current_user).map(str::to_owned) else {
            tracing::debug!(
                code = DIRECT_CHAT_UNRESOLVED,
                chat_id = %chat.id,
                participants = chat.participants.len(),
                "direct chat hidden: counterpart cannot be resolved"
            );
            continue;
        };

        match latest_direct.entry(other) {
            Entry::Vacant(slot) => {
                slot.insert(chat);
            }
            Entry::Occupied(mut slot) => {
                if chat.updated_at > slot.get().updated_at {
                    slot.insert(chat);
                }
            }
        }
    }

    merged.extend(latest_direct.into_values());
    merged.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    merged
}

/// Finds the most recently updated direct chat between `user_a` and `user_b`.
pub fn find_direct_chat(
    store: &dyn DocumentStore,
    user_a: &str,
    user_b: &str,
) -> Result<Option<Chat>, ChatError> {
    let user_a = user_a.trim();
    let user_b = user_b.trim();
    let query = Query::collection(CHATS)
        .where_array_contains("participants", user_a)
        .where_eq("type", ChatKind::Direct.as_str());

    let docs = store.query(&query).map_err(map_store_error)?;
    let found = decode_chats(&docs)
        .into_iter()
        .filter(|chat| chat.other_participant(user_a) == Some(user_b))
        .reduce(|best, chat| {
            if chat.updated_at > best.updated_at {
                chat
            } else {
                best
            }
        });

    Ok(found)
}

/// Returns the existing direct chat between the two users, creating one when
/// none exists.
pub fn get_or_create_direct_chat(
    store: &dyn DocumentStore,
    user_a: &str,
    user_b: &str,
) -> Result<Chat, ChatError> {
    if let Some(chat) = find_direct_chat(store, user_a, user_b)? {
        return Ok(chat);
    }

    create_chat(store, NewChat::direct(user_a, user_b))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap as Map;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::{store::InMemoryStore, test_support::seed_chat};

    fn chat(id: &str, kind: ChatKind, participants: &[&str], updated_at_ms: i64) -> Chat {
        let at = DateTime::<Utc>::from_timestamp_millis(updated_at_ms).expect("valid timestamp");
        Chat {
            id: id.to_owned(),
            kind,
            name: None,
            participants: participants.iter().map(|p| (*p).to_owned()).collect(),
            project_id: None,
            created_at: at,
            updated_at: at,
            last_message: None,
            unread_counts: Map::new(),
        }
    }

    fn ids(chats: &[Chat]) -> Vec<&str> {
        chats.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn keeps_most_recent_direct_chat_per_counterpart() {
        let chats = vec![
            chat("d1", ChatKind::Direct, &["a", "b"], 10),
            chat("g", ChatKind::Group, &["a", "b", "c"], 20),
            chat("d3", ChatKind::Direct, &["b", "a"], 30),
            chat("d2", ChatKind::Direct, &["a", "b"], 15),
        ];

        let merged = merge_direct_chats(chats, "a");

        assert_eq!(ids(&merged), ["d3", "g"]);
    }

    #[test]
    fn keeps_one_chat_per_distinct_counterpart() {
        let chats = vec![
            chat("ab", ChatKind::Direct, &["a", "b"], 10),
            chat("ac", ChatKind::Direct, &["a", "c"], 20),
            chat("p", ChatKind::Project, &["a", "b"], 5),
        ];

        let merged = merge_direct_chats(chats, "a");

        assert_eq!(ids(&merged), ["ac", "ab", "p"]);
    }

    #[test]
    fn drops_direct_chat_with_unresolvable_counterpart() {
        let chats = vec![
            chat("lonely", ChatKind::Direct, &["a"], 10),
            chat("g", ChatKind::Group, &["a"], 5),
        ];

        let merged = merge_direct_chats(chats, "a");

        assert_eq!(ids(&merged), ["g"]);
    }

    #[test]
    fn group_chats_are_never_merged() {
        let chats = vec![
            chat("g1", ChatKind::Group, &["a", "b"], 10),
            chat("g2", ChatKind::Group, &["a", "b"], 20),
        ];

        assert_eq!(ids(&merge_direct_chats(chats, "a")), ["g2", "g1"]);
    }

    #[test]
    fn find_direct_chat_returns_most_recent_match() {
        let store = InMemoryStore::new();
        seed_chat(&store, "d1", "direct", &["a", "b"], 10);
        seed_chat(&store, "d2", "direct", &["b", "a"], 30);
        seed_chat(&store, "g", "group", &["a", "b"], 50);
        seed_chat(&store, "ac", "direct", &["a", "c"], 40);

        let found = find_direct_chat(&store, "a", "b").expect("lookup should succeed");

        assert_eq!(found.map(|c| c.id), Some("d2".to_owned()));
    }

    #[test]
    fn find_direct_chat_returns_none_without_match() {
        let store = InMemoryStore::new();
        seed_chat(&store, "ac", "direct", &["a", "c"], 40);

        assert_eq!(find_direct_chat(&store, "a", "b").expect("lookup"), None);
    }

    #[test]
    fn get_or_create_reuses_existing_chat() {
        let store = InMemoryStore::new();
        seed_chat(&store, "d1", "direct", &["a", "b"], 10);

        let chat = get_or_create_direct_chat(&store, "b", "a").expect("should resolve");

        assert_eq!(chat.id, "d1");
    }

    #[test]
    fn get_or_create_creates_missing_chat_once() {
        let store = InMemoryStore::new();

        let first = get_or_create_direct_chat(&store, "a", "b").expect("should create");
        let second = get_or_create_direct_chat(&store, "a", "b").expect("should reuse");

        assert_eq!(first.id, second.id);
        assert_eq!(first.kind, ChatKind::Direct);
    }
}
