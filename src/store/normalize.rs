//! Conversion between stored documents and domain records.
//!
//! Decoding is total: missing or mistyped fields fall back to defaults, and a
//! document is only dropped when it has no usable id.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::document::{instant_millis, Document, Fields};
use crate::domain::{
    chat::{Chat, ChatKind, LastMessage},
    message::{Message, MessageKind, MessageStatus},
};

const STORE_DOCUMENT_DROPPED: &str = "STORE_DOCUMENT_DROPPED";

pub fn decode_message(doc: &Document) -> Option<Message> {
    let id = doc.id.trim();
    if id.is_empty() {
        tracing::warn!(
            code = STORE_DOCUMENT_DROPPED,
            kind = "message",
            "message document without id dropped"
        );
        return None;
    }

    let kind = match string_field(&doc.fields, "type") {
        Some(raw) => MessageKind::parse(raw).unwrap_or_else(|| {
            tracing::debug!(message_id = id, kind = raw, "unknown message kind, using text");
            MessageKind::Text
        }),
        None => MessageKind::Text,
    };

    let sent_at = timestamp_field(&doc.fields, "sent_at").unwrap_or_else(|| {
        tracing::debug!(message_id = id, "message without send time, using now");
        Utc::now()
    });

    Some(Message {
        id: id.to_owned(),
        chat_id: string_field(&doc.fields, "chat_id")
            .map(str::trim)
            .unwrap_or_default()
            .to_owned(),
        sender_id: string_field(&doc.fields, "sender_id")
            .map(str::trim)
            .unwrap_or_default()
            .to_owned(),
        sender_name: non_blank(string_field(&doc.fields, "sender_name")),
        content: string_field(&doc.fields, "content")
            .unwrap_or_default()
            .to_owned(),
        kind,
        sent_at,
        status: string_field(&doc.fields, "status")
            .and_then(MessageStatus::parse)
            .unwrap_or(MessageStatus::Sent),
        read_by: id_set(doc.fields.get("read_by")),
    })
}

pub fn decode_chat(doc: &Document) -> Option<Chat> {
    let id = doc.id.trim();
    if id.is_empty() {
        tracing::warn!(
            code = STORE_DOCUMENT_DROPPED,
            kind = "chat",
            "chat document without id dropped"
        );
        return None;
    }

    let participants = id_list(doc.fields.get("participants"));
    let created_at =
        timestamp_field(&doc.fields, "created_at").unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let updated_at = timestamp_field(&doc.fields, "updated_at").unwrap_or(created_at);

    let unread_counts = doc
        .fields
        .get("unread_counts")
        .and_then(Value::as_object)
        .map(|counts| {
            counts
                .iter()
                .filter(|(user, _)| participants.iter().any(|p| p == user.trim()))
                .filter_map(|(user, count)| {
                    let count = count.as_u64()?;
                    Some((
                        user.trim().to_owned(),
                        u32::try_from(count).unwrap_or(u32::MAX),
                    ))
                })
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    Some(Chat {
        id: id.to_owned(),
        kind: string_field(&doc.fields, "type")
            .and_then(ChatKind::parse)
            .unwrap_or_default(),
        name: non_blank(string_field(&doc.fields, "name")),
        participants,
        project_id: non_blank(string_field(&doc.fields, "project_id")),
        created_at,
        updated_at,
        last_message: doc
            .fields
            .get("last_message")
            .and_then(Value::as_object)
            .and_then(decode_last_message),
        unread_counts,
    })
}

fn decode_last_message(fields: &Fields) -> Option<LastMessage> {
    let message_id = string_field(fields, "message_id")?.trim();
    if message_id.is_empty() {
        return None;
    }

    Some(LastMessage {
        message_id: message_id.to_owned(),
        content: string_field(fields, "content").unwrap_or_default().to_owned(),
        sender_id: string_field(fields, "sender_id")
            .map(str::trim)
            .unwrap_or_default()
            .to_owned(),
        kind: string_field(fields, "type")
            .and_then(MessageKind::parse)
            .unwrap_or_default(),
        sent_at: timestamp_field(fields, "sent_at").unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

/// Decodes a batch of message documents, dropping the ones that fail.
pub fn decode_messages(docs: &[Document]) -> Vec<Message> {
    decode_batch(docs, "message", decode_message)
}

/// Decodes a batch of chat documents, dropping the ones that fail.
pub fn decode_chats(docs: &[Document]) -> Vec<Chat> {
    decode_batch(docs, "chat", decode_chat)
}

fn decode_batch<T>(
    docs: &[Document],
    kind: &'static str,
    decode: fn(&Document) -> Option<T>,
) -> Vec<T> {
    let decoded: Vec<T> = docs.iter().filter_map(decode).collect();
    let dropped = docs.len() - decoded.len();
    if dropped > 0 {
        tracing::warn!(
            code = STORE_DOCUMENT_DROPPED,
            kind,
            dropped,
            total = docs.len(),
            "malformed documents dropped from batch"
        );
    }
    decoded
}

pub fn encode_message(message: &Message) -> Fields {
    let mut fields = Fields::new();
    fields.insert("chat_id".to_owned(), json!(message.chat_id));
    fields.insert("sender_id".to_owned(), json!(message.sender_id));
    if let Some(name) = &message.sender_name {
        fields.insert("sender_name".to_owned(), json!(name));
    }
    fields.insert("content".to_owned(), json!(message.content));
    fields.insert("type".to_owned(), json!(message.kind.as_str()));
    fields.insert("sent_at".to_owned(), json!(message.sent_at.timestamp_millis()));
    fields.insert("status".to_owned(), json!(message.status.as_str()));
    fields.insert(
        "read_by".to_owned(),
        Value::Array(message.read_by.iter().map(|id| json!(id)).collect()),
    );
    fields
}

pub fn encode_last_message(summary: &LastMessage) -> Value {
    json!({
        "message_id": summary.message_id,
        "content": summary.content,
        "sender_id": summary.sender_id,
        "type": summary.kind.as_str(),
        "sent_at": summary.sent_at.timestamp_millis(),
    })
}

fn encode_unread_counts(counts: &BTreeMap<String, u32>) -> Value {
    Value::Object(
        counts
            .iter()
            .map(|(user, count)| (user.clone(), json!(count)))
            .collect(),
    )
}

pub fn encode_chat(chat: &Chat) -> Fields {
    let mut fields = Fields::new();
    fields.insert("type".to_owned(), json!(chat.kind.as_str()));
    if let Some(name) = &chat.name {
        fields.insert("name".to_owned(), json!(name));
    }
    fields.insert("participants".to_owned(), json!(chat.participants));
    if let Some(project_id) = &chat.project_id {
        fields.insert("project_id".to_owned(), json!(project_id));
    }
    fields.insert("created_at".to_owned(), json!(chat.created_at.timestamp_millis()));
    fields.insert("updated_at".to_owned(), json!(chat.updated_at.timestamp_millis()));
    fields.insert(
        "last_message".to_owned(),
        chat.last_message
            .as_ref()
            .map(encode_last_message)
            .unwrap_or(Value::Null),
    );
    fields.insert(
        "unread_counts".to_owned(),
        encode_unread_counts(&chat.unread_counts),
    );
    fields
}

fn string_field<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(Value::as_str)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn timestamp_field(fields: &Fields, name: &str) -> Option<DateTime<Utc>> {
    fields
        .get(name)
        .and_then(instant_millis)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn id_list(value: Option<&Value>) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        if !ids.iter().any(|known| known == id) {
            ids.push(id.to_owned());
        }
    }
    ids
}

fn id_set(value: Option<&Value>) -> BTreeSet<String> {
    id_list(value).into_iter().collect()
}
