use super::error::{map_store_error, ChatError};
use crate::{
    domain::{chat::Chat, message::Message},
    store::{
        normalize::{decode_chat, decode_messages},
        Direction, DocumentStore, Query, CHATS, MESSAGES,
    },
};

/// Most recent messages kept for one chat, in history reads and live batches.
pub const MAX_MESSAGES_PER_CHAT: usize = 1000;

/// Clamps a requested message count into `1..=MAX_MESSAGES_PER_CHAT`.
/// Zero selects the maximum.
pub fn normalized_message_limit(limit: usize) -> usize {
    match limit {
        0 => MAX_MESSAGES_PER_CHAT,
        value if value > MAX_MESSAGES_PER_CHAT => MAX_MESSAGES_PER_CHAT,
        value => value,
    }
}

/// Reads the stored messages of `chat_id` once, oldest first.
pub fn get_message_history(
    store: &dyn DocumentStore,
    chat_id: &str,
    limit: usize,
) -> Result<Vec<Message>, ChatError> {
    let query = Query::collection(MESSAGES)
        .where_eq("chat_id", chat_id.trim())
        .order_by("sent_at", Direction::Ascending)
        .limit_to_last(normalized_message_limit(limit));

    let docs = store.query(&query).map_err(map_store_error)?;
    let mut messages = decode_messages(&docs);
    messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
    Ok(messages)
}

pub fn get_chat(store: &dyn DocumentStore, chat_id: &str) -> Result<Chat, ChatError> {
    let chat_id = chat_id.trim();
    store
        .get(CHATS, chat_id)
        .map_err(map_store_error)?
        .as_ref()
        .and_then(decode_chat)
        .ok_or_else(|| ChatError::not_found("chat", chat_id))
}
