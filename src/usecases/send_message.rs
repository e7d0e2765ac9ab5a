//! Use case for sending a message to a chat.
//!
//! The message document is written first. The chat's last-message summary,
//! update time and unread counters are refreshed afterwards in a separate
//! write; a failure there is logged and does not fail the send.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::error::{map_store_error, ChatError};
use crate::{
    domain::{
        chat::{Chat, LastMessage},
        message::{sanitize_sender_id, Message, MessageKind, MessageStatus},
    },
    store::{
        normalize::{decode_chat, encode_last_message, encode_message},
        DocumentStore, Fields, CHATS, MESSAGES,
    },
};

const SENDER_SANITIZED: &str = "CHAT_SENDER_SANITIZED";
const SUMMARY_UPDATE_FAILED: &str = "CHAT_SUMMARY_UPDATE_FAILED";

/// Message as composed by the client, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    /// Client-generated id; allocated by the store when absent or blank.
    pub id: Option<String>,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub content: String,
    pub kind: MessageKind,
    pub sent_at: Option<DateTime<Utc>>,
    pub status: Option<MessageStatus>,
    pub read_by: BTreeSet<String>,
}

impl OutgoingMessage {
    pub fn text(chat_id: &str, sender_id: &str, content: &str) -> Self {
        Self {
            chat_id: chat_id.to_owned(),
            sender_id: sender_id.to_owned(),
            content: content.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_owned());
        self
    }
}

/// Persists `outgoing` and refreshes the owning chat's summary.
///
/// Returns the message exactly as stored.
pub fn send_message(
    store: &dyn DocumentStore,
    outgoing: OutgoingMessage,
) -> Result<Message, ChatError> {
    let message = compose(store, outgoing)?;
    deliver(store, &message)?;
    Ok(message)
}

/// Writes a composed message, then refreshes the owning chat's summary.
pub fn deliver(store: &dyn DocumentStore, message: &Message) -> Result<(), ChatError> {
    store
        .set(MESSAGES, &message.id, encode_message(message))
        .map_err(map_store_error)?;

    tracing::debug!(
        chat_id = %message.chat_id,
        message_id = %message.id,
        "message stored"
    );

    if let Err(error) = refresh_chat_summary(store, message) {
        tracing::warn!(
            code = SUMMARY_UPDATE_FAILED,
            chat_id = %message.chat_id,
            message_id = %message.id,
            error = %error,
            "message stored but chat summary is stale"
        );
    }

    Ok(())
}

/// Validates `outgoing` and applies defaults, producing the message that
/// [`deliver`] will store. Nothing is written.
pub fn compose(store: &dyn DocumentStore, outgoing: OutgoingMessage) -> Result<Message, ChatError> {
    let chat_id = outgoing.chat_id.trim();
    if chat_id.is_empty() {
        return Err(ChatError::InvalidArgument("chat id is empty".to_owned()));
    }
    if outgoing.kind == MessageKind::Text && outgoing.content.trim().is_empty() {
        return Err(ChatError::InvalidArgument("message text is empty".to_owned()));
    }

    let id = match outgoing.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_owned(),
        _ => store.allocate_id(),
    };

    let (sender_id, substituted) = sanitize_sender_id(&outgoing.sender_id);
    if substituted {
        tracing::warn!(
            code = SENDER_SANITIZED,
            chat_id,
            message_id = %id,
            "outgoing message had a blank sender id; stored with sentinel"
        );
    }

    let mut read_by: BTreeSet<String> = outgoing
        .read_by
        .iter()
        .map(|reader| reader.trim())
        .filter(|reader| !reader.is_empty())
        .map(str::to_owned)
        .collect();
    read_by.insert(sender_id.clone());

    Ok(Message {
        id,
        chat_id: chat_id.to_owned(),
        sender_id,
        sender_name: outgoing
            .sender_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty()),
        content: outgoing.content,
        kind: outgoing.kind,
        sent_at: outgoing.sent_at.unwrap_or_else(Utc::now),
        status: outgoing.status.unwrap_or(MessageStatus::Sent),
        read_by,
    })
}

fn refresh_chat_summary(store: &dyn DocumentStore, message: &Message) -> Result<(), ChatError> {
    let chat = store
        .get(CHATS, &message.chat_id)
        .map_err(map_store_error)?
        .as_ref()
        .and_then(decode_chat)
        .ok_or_else(|| ChatError::not_found("chat", &message.chat_id))?;

    store
        .update(CHATS, &chat.id, summary_fields(&chat, message))
        .map_err(map_store_error)
}

/// Summary fields plus one `unread_counts.<participant>` entry per recipient,
/// so counters of other participants are never rewritten.
fn summary_fields(chat: &Chat, message: &Message) -> Fields {
    let mut fields = Fields::new();
    fields.insert(
        "last_message".to_owned(),
        encode_last_message(&LastMessage::from(message)),
    );
    fields.insert(
        "updated_at".to_owned(),
        json!(message.sent_at.timestamp_millis()),
    );
    for participant in chat.participants.iter().map(|p| p.trim()) {
        if participant.is_empty() || message.is_from(participant) {
            continue;
        }
        fields.insert(
            format!("unread_counts.{participant}"),
            json!(chat.unread_for(participant).saturating_add(1)),
        );
    }
    fields
}
