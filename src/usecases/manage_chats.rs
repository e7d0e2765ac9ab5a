//! Chat lifecycle: creation, membership changes and explicit deletion.

use chrono::Utc;
use serde_json::{json, Value};

use super::{
    error::{map_store_error, ChatError},
    load_messages::get_chat,
};
use crate::{
    domain::chat::{Chat, ChatKind, LastMessage},
    store::{
        normalize::{decode_message, decode_messages, encode_chat, encode_last_message},
        Direction, DocumentStore, Fields, Query, CHATS, MESSAGES,
    },
};

const SUMMARY_RECOMPUTE_FAILED: &str = "CHAT_SUMMARY_RECOMPUTE_FAILED";

/// Parameters of a chat to create.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewChat {
    pub kind: ChatKind,
    pub name: Option<String>,
    pub participants: Vec<String>,
    pub project_id: Option<String>,
}

impl NewChat {
    pub fn direct(user_a: &str, user_b: &str) -> Self {
        Self {
            kind: ChatKind::Direct,
            participants: vec![user_a.to_owned(), user_b.to_owned()],
            ..Self::default()
        }
    }

    pub fn group(name: &str, participants: &[&str]) -> Self {
        Self {
            kind: ChatKind::Group,
            name: Some(name.to_owned()),
            participants: participants.iter().map(|p| (*p).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn project(project_id: &str, name: &str, participants: &[&str]) -> Self {
        Self {
            kind: ChatKind::Project,
            project_id: Some(project_id.to_owned()),
            ..Self::group(name, participants)
        }
    }
}

/// Creates a chat with every participant's unread counter at zero.
pub fn create_chat(store: &dyn DocumentStore, new_chat: NewChat) -> Result<Chat, ChatError> {
    let mut participants: Vec<String> = Vec::with_capacity(new_chat.participants.len());
    for participant in new_chat.participants.iter().map(|p| p.trim()) {
        if !participant.is_empty() && !participants.iter().any(|p| p == participant) {
            participants.push(participant.to_owned());
        }
    }

    if participants.is_empty() {
        return Err(ChatError::InvalidArgument("chat has no participants".to_owned()));
    }
    if new_chat.kind == ChatKind::Direct && participants.len() != 2 {
        return Err(ChatError::InvalidArgument(
            "direct chat needs exactly two distinct participants".to_owned(),
        ));
    }

    let project_id = new_chat
        .project_id
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty());
    if new_chat.kind == ChatKind::Project && project_id.is_none() {
        return Err(ChatError::InvalidArgument("project chat needs a project id".to_owned()));
    }

    let now = Utc::now();
    let chat = Chat {
        id: store.allocate_id(),
        kind: new_chat.kind,
        name: new_chat
            .name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty()),
        unread_counts: participants.iter().map(|p| (p.clone(), 0)).collect(),
        participants,
        project_id,
        created_at: now,
        updated_at: now,
        last_message: None,
    };

    store
        .set(CHATS, &chat.id, encode_chat(&chat))
        .map_err(map_store_error)?;

    tracing::info!(
        chat_id = %chat.id,
        kind = chat.kind.as_str(),
        participants = chat.participants.len(),
        "chat created"
    );

    Ok(chat)
}

/// Deletes one message. When it was the chat's summarized last message, the
/// summary is rebuilt from the most recent surviving message, or cleared.
///
/// The message must exist and belong to `chat_id`.
pub fn delete_message(
    store: &dyn DocumentStore,
    chat_id: &str,
    message_id: &str,
) -> Result<(), ChatError> {
    let chat = get_chat(store, chat_id)?;
    let message_id = message_id.trim();

    let message = store
        .get(MESSAGES, message_id)
        .map_err(map_store_error)?
        .as_ref()
        .and_then(decode_message)
        .ok_or_else(|| ChatError::not_found("message", message_id))?;
    if message.chat_id != chat.id {
        return Err(ChatError::InvalidArgument(format!(
            "message {message_id} does not belong to chat {}",
            chat.id
        )));
    }

    store
        .delete(MESSAGES, &message.id)
        .map_err(map_store_error)?;

    let was_summarized = chat
        .last_message
        .as_ref()
        .is_some_and(|summary| summary.message_id == message.id);
    if !was_summarized {
        return Ok(());
    }

    if let Err(error) = recompute_summary(store, &chat.id) {
        tracing::warn!(
            code = SUMMARY_RECOMPUTE_FAILED,
            chat_id = %chat.id,
            message_id,
            error = %error,
            "message deleted but chat summary still points at it"
        );
    }

    Ok(())
}

fn recompute_summary(store: &dyn DocumentStore, chat_id: &str) -> Result<(), ChatError> {
    let query = Query::collection(MESSAGES)
        .where_eq("chat_id", chat_id)
        .order_by("sent_at", Direction::Descending)
        .limit(1);
    let docs = store.query(&query).map_err(map_store_error)?;
    let survivor = decode_messages(&docs).into_iter().next();

    let mut fields = Fields::new();
    fields.insert(
        "last_message".to_owned(),
        survivor
            .as_ref()
            .map(|message| encode_last_message(&LastMessage::from(message)))
            .unwrap_or(Value::Null),
    );
    store
        .update(CHATS, chat_id, fields)
        .map_err(map_store_error)
}

/// Deletes a chat together with all of its messages.
///
/// Messages go first; if one of those deletions fails the chat is kept so the
/// call can be retried. Returns the number of messages removed.
pub fn delete_chat(store: &dyn DocumentStore, chat_id: &str) -> Result<usize, ChatError> {
    let chat = get_chat(store, chat_id)?;

    let docs = store
        .query(&Query::collection(MESSAGES).where_eq("chat_id", chat.id.as_str()))
        .map_err(map_store_error)?;
    for doc in &docs {
        store
            .delete(MESSAGES, &doc.id)
            .map_err(map_store_error)?;
    }

    store.delete(CHATS, &chat.id).map_err(map_store_error)?;

    tracing::info!(chat_id = %chat.id, messages = docs.len(), "chat deleted");
    Ok(docs.len())
}

/// Adds `user_id` to a group or project chat with an unread counter of zero.
pub fn add_participant(
    store: &dyn DocumentStore,
    chat_id: &str,
    user_id: &str,
) -> Result<Chat, ChatError> {
    let mut chat = membership_target(store, chat_id, user_id)?;
    let user_id = user_id.trim();
    if chat.has_participant(user_id) {
        return Ok(chat);
    }

    chat.participants.push(user_id.to_owned());
    chat.unread_counts.insert(user_id.to_owned(), 0);
    write_membership(store, &chat, user_id, json!(0))?;
    Ok(chat)
}

/// Removes `user_id` from a group or project chat along with their counter.
pub fn remove_participant(
    store: &dyn DocumentStore,
    chat_id: &str,
    user_id: &str,
) -> Result<Chat, ChatError> {
    let mut chat = membership_target(store, chat_id, user_id)?;
    let user_id = user_id.trim();
    if !chat.has_participant(user_id) {
        return Ok(chat);
    }

    chat.participants.retain(|p| p.trim() != user_id);
    chat.unread_counts.remove(user_id);
    write_membership(store, &chat, user_id, Value::Null)?;
    Ok(chat)
}

fn membership_target(
    store: &dyn DocumentStore,
    chat_id: &str,
    user_id: &str,
) -> Result<Chat, ChatError> {
    if user_id.trim().is_empty() {
        return Err(ChatError::InvalidArgument("user id is empty".to_owned()));
    }

    let chat = get_chat(store, chat_id)?;
    if chat.kind == ChatKind::Direct {
        return Err(ChatError::InvalidArgument(
            "direct chat membership cannot change".to_owned(),
        ));
    }
    Ok(chat)
}

/// Writes the participant list and only `user_id`'s counter entry; a null
/// counter removes the entry.
fn write_membership(
    store: &dyn DocumentStore,
    chat: &Chat,
    user_id: &str,
    counter: Value,
) -> Result<(), ChatError> {
    let mut fields = Fields::new();
    fields.insert("participants".to_owned(), json!(chat.participants));
    fields.insert(format!("unread_counts.{user_id}"), counter);
    store
        .update(CHATS, &chat.id, fields)
        .map_err(map_store_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{InMemoryStore, StoreError},
        test_support::{fields, seed_chat, seed_message, stored_chat, stored_message},
        usecases::send_message::{send_message, OutgoingMessage},
    };

    #[test]
    fn creates_direct_chat_with_zeroed_counters() {
        let store = InMemoryStore::new();

        let chat = create_chat(&store, NewChat::direct(" alice ", "bob")).expect("create");

        let stored = stored_chat(&store, &chat.id);
        assert_eq!(stored.kind, ChatKind::Direct);
        assert_eq!(stored.participants, ["alice", "bob"]);
        assert_eq!(stored.unread_for("alice"), 0);
        assert_eq!(stored.unread_counts.len(), 2);
        assert_eq!(stored.last_message, None);
    }

    #[test]
    fn rejects_direct_chat_with_same_user_twice() {
        let store = InMemoryStore::new();

        let err = create_chat(&store, NewChat::direct("alice", " alice")).expect_err("must fail");

        assert!(matches!(err, ChatError::InvalidArgument(_)));
    }

    #[test]
    fn rejects_project_chat_without_project() {
        let store = InMemoryStore::new();

        let err = create_chat(&store, NewChat::project("  ", "Launch", &["alice"]))
            .expect_err("must fail");

        assert!(matches!(err, ChatError::InvalidArgument(_)));
    }

    #[test]
    fn group_chat_deduplicates_participants() {
        let store = InMemoryStore::new();

        let chat = create_chat(&store, NewChat::group("Team", &["a", "b", " a", ""]))
            .expect("create");

        assert_eq!(chat.participants, ["a", "b"]);
        assert_eq!(chat.name.as_deref(), Some("Team"));
    }

    #[test]
    fn deleting_last_message_falls_back_to_previous() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        let first = send_message(&store, OutgoingMessage::text("c1", "alice", "first"))
            .expect("first send");
        let second = send_message(
            &store,
            OutgoingMessage {
                sent_at: Some(first.sent_at + chrono::TimeDelta::seconds(5)),
                ..OutgoingMessage::text("c1", "bob", "second")
            },
        )
        .expect("second send");

        delete_message(&store, "c1", &second.id).expect("delete");

        let summary = stored_chat(&store, "c1").last_message.expect("summary kept");
        assert_eq!(summary.message_id, first.id);
        assert_eq!(summary.content, "first");
    }

    #[test]
    fn deleting_only_message_clears_summary() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        let sent = send_message(&store, OutgoingMessage::text("c1", "alice", "solo"))
            .expect("send");

        delete_message(&store, "c1", &sent.id).expect("delete");

        assert_eq!(stored_chat(&store, "c1").last_message, None);
        assert_eq!(store.get(MESSAGES, &sent.id).expect("read"), None);
    }

    #[test]
    fn deleting_older_message_keeps_summary() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        seed_message(&store, "old", "c1", "bob", 10);
        let sent = send_message(&store, OutgoingMessage::text("c1", "alice", "latest"))
            .expect("send");

        delete_message(&store, "c1", "old").expect("delete");

        let summary = stored_chat(&store, "c1").last_message.expect("summary kept");
        assert_eq!(summary.message_id, sent.id);
    }

    #[test]
    fn deleting_unknown_message_is_not_found() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);

        assert_eq!(
            delete_message(&store, "c1", "does-not-exist").expect_err("must fail"),
            ChatError::not_found("message", "does-not-exist")
        );
    }

    #[test]
    fn deleting_through_another_chat_is_rejected() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        seed_chat(&store, "c2", "group", &["alice", "bob"], 0);
        let sent = send_message(&store, OutgoingMessage::text("c2", "alice", "only one"))
            .expect("send");

        let result = delete_message(&store, "c1", &sent.id);

        assert!(matches!(result, Err(ChatError::InvalidArgument(_))));
        assert_eq!(stored_message(&store, &sent.id).content, "only one");
        let summary = stored_chat(&store, "c2").last_message.expect("summary kept");
        assert_eq!(summary.message_id, sent.id);
    }

    #[test]
    fn recompute_orders_text_and_numeric_send_times_by_instant() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        store
            .set(
                MESSAGES,
                "ancient",
                fields(json!({
                    "chat_id": "c1",
                    "sender_id": "bob",
                    "content": "ancient",
                    "sent_at": "2001-09-09T01:46:40Z",
                })),
            )
            .expect("seed text-dated message");
        seed_message(&store, "recent", "c1", "bob", 1_700_000_000_000);
        let latest = send_message(
            &store,
            OutgoingMessage {
                sent_at: chrono::DateTime::<Utc>::from_timestamp_millis(1_700_000_060_000),
                ..OutgoingMessage::text("c1", "alice", "latest")
            },
        )
        .expect("send");

        delete_message(&store, "c1", &latest.id).expect("delete");

        let summary = stored_chat(&store, "c1").last_message.expect("summary kept");
        assert_eq!(summary.message_id, "recent");
    }

    #[test]
    fn delete_chat_cascades_to_messages() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        seed_chat(&store, "c2", "group", &["alice", "bob"], 0);
        seed_message(&store, "m1", "c1", "alice", 10);
        seed_message(&store, "m2", "c1", "bob", 20);
        seed_message(&store, "other", "c2", "bob", 20);

        let removed = delete_chat(&store, "c1").expect("delete");

        assert_eq!(removed, 2);
        assert_eq!(store.get(CHATS, "c1").expect("read"), None);
        assert_eq!(store.get(MESSAGES, "m1").expect("read"), None);
        assert!(store.get(MESSAGES, "other").expect("read").is_some());
    }

    #[test]
    fn delete_chat_keeps_chat_when_message_deletion_fails() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        seed_message(&store, "m1", "c1", "alice", 10);
        store.fail_next_write(MESSAGES, StoreError::Unavailable("offline".to_owned()));

        let err = delete_chat(&store, "c1").expect_err("must fail");

        assert_eq!(err, ChatError::Unavailable("offline".to_owned()));
        assert!(store.get(CHATS, "c1").expect("read").is_some());
    }

    #[test]
    fn delete_missing_chat_is_not_found() {
        let store = InMemoryStore::new();

        assert_eq!(
            delete_chat(&store, "ghost").expect_err("must fail"),
            ChatError::not_found("chat", "ghost")
        );
    }

    #[test]
    fn added_participant_starts_at_zero() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice"], 0);

        add_participant(&store, "c1", "carol").expect("add");

        let chat = stored_chat(&store, "c1");
        assert!(chat.has_participant("carol"));
        assert_eq!(chat.unread_counts.get("carol"), Some(&0));
    }

    #[test]
    fn removed_participant_loses_counter() {
        let store = InMemoryStore::new();
        seed_chat(&store, "c1", "group", &["alice", "bob"], 0);
        store
            .update(CHATS, "c1", fields(json!({"unread_counts": {"alice": 4, "bob": 3}})))
            .expect("seed counters");

        remove_participant(&store, "c1", "bob").expect("remove");

        let chat = stored_chat(&store, "c1");
        assert_eq!(chat.participants, ["alice"]);
        assert_eq!(chat.unread_counts.get("bob"), None);
        assert_eq!(chat.unread_for("alice"), 4);
    }

    #[test]
    fn direct_chat_membership_is_fixed() {
        let store = InMemoryStore::new();
        seed_chat(&store, "d1", "direct", &["alice", "bob"], 0);

        assert!(matches!(
            add_participant(&store, "d1", "carol"),
            Err(ChatError::InvalidArgument(_))
        ));
        assert!(matches!(
            remove_participant(&store, "d1", "bob"),
            Err(ChatError::InvalidArgument(_))
        ));
    }
}
