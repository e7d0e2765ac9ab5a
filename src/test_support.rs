use serde_json::json;

use crate::{
    domain::{chat::Chat, message::Message},
    store::{
        normalize::{decode_chat, decode_message},
        DocumentStore, Fields, InMemoryStore, CHATS, MESSAGES,
    },
};

pub fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().expect("fixture must be an object")
}

pub fn seed_chat(
    store: &InMemoryStore,
    id: &str,
    kind: &str,
    participants: &[&str],
    updated_at_ms: i64,
) {
    store
        .set(
            CHATS,
            id,
            fields(json!({
                "type": kind,
                "participants": participants,
                "created_at": updated_at_ms,
                "updated_at": updated_at_ms,
                "unread_counts": {},
            })),
        )
        .expect("chat fixture should be stored");
}

pub fn seed_message(store: &InMemoryStore, id: &str, chat_id: &str, sender: &str, sent_at_ms: i64) {
    store
        .set(
            MESSAGES,
            id,
            fields(json!({
                "chat_id": chat_id,
                "sender_id": sender,
                "content": format!("message {id}"),
                "type": "text",
                "sent_at": sent_at_ms,
                "status": "sent",
                "read_by": [sender],
            })),
        )
        .expect("message fixture should be stored");
}

pub fn stored_chat(store: &InMemoryStore, id: &str) -> Chat {
    let doc = store
        .get(CHATS, id)
        .expect("chat read should succeed")
        .expect("chat should exist");
    decode_chat(&doc).expect("chat should decode")
}

pub fn stored_message(store: &InMemoryStore, id: &str) -> Message {
    let doc = store
        .get(MESSAGES, id)
        .expect("message read should succeed")
        .expect("message should exist");
    decode_message(&doc).expect("message should decode")
}
