//! Read-state reconciliation: read markers on messages and per-participant
//! unread counters on chats.

use std::collections::HashSet;

use serde_json::{json, Value};

use super::{
    context::SessionContext,
    error::{map_store_error, ChatError},
};
use crate::{
    domain::message::{Message, MessageStatus},
    store::{
        normalize::{decode_chat, decode_message},
        DocumentStore, Fields, CHATS, MESSAGES,
    },
};

const UNREAD_COUNTER_UPDATE_FAILED: &str = "CHAT_UNREAD_COUNTER_UPDATE_FAILED";
const READ_RECEIPT_FAILED: &str = "CHAT_READ_RECEIPT_FAILED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The reader was added to the message's read set.
    Marked,
    /// The reader had already read the message; nothing was written.
    AlreadyRead,
}

/// Marks `message_id` as read by `reader_id` and decrements the reader's
/// unread counter on the chat, never below zero.
///
/// The counter write happens after the message write. If it fails the message
/// stays marked and the counter is left stale.
pub fn mark_read(
    store: &dyn DocumentStore,
    message_id: &str,
    chat_id: &str,
    reader_id: &str,
) -> Result<ReadOutcome, ChatError> {
    let reader_id = reader_id.trim();
    if reader_id.is_empty() {
        return Err(ChatError::InvalidArgument("reader id is empty".to_owned()));
    }

    let message = store
        .get(MESSAGES, message_id)
        .map_err(map_store_error)?
        .as_ref()
        .and_then(decode_message)
        .ok_or_else(|| ChatError::not_found("message", message_id))?;
    if message.chat_id != chat_id.trim() {
        return Err(ChatError::InvalidArgument(format!(
            "message {message_id} does not belong to chat {}",
            chat_id.trim()
        )));
    }

    if message.is_read_by(reader_id) {
        return Ok(ReadOutcome::AlreadyRead);
    }

    let mut read_by = message.read_by.clone();
    read_by.insert(reader_id.to_owned());

    let mut fields = Fields::new();
    fields.insert(
        "read_by".to_owned(),
        Value::Array(read_by.iter().map(|id| json!(id)).collect()),
    );
    fields.insert("status".to_owned(), json!(MessageStatus::Read.as_str()));
    store
        .update(MESSAGES, &message.id, fields)
        .map_err(map_store_error)?;

    if let Err(error) = decrement_unread(store, &message.chat_id, reader_id) {
        tracing::warn!(
            code = UNREAD_COUNTER_UPDATE_FAILED,
            chat_id,
            message_id,
            error = %error,
            "message marked read but unread counter is stale"
        );
    }

    Ok(ReadOutcome::Marked)
}

fn decrement_unread(
    store: &dyn DocumentStore,
    chat_id: &str,
    reader_id: &str,
) -> Result<(), ChatError> {
    let chat = store
        .get(CHATS, chat_id)
        .map_err(map_store_error)?
        .as_ref()
        .and_then(decode_chat)
        .ok_or_else(|| ChatError::not_found("chat", chat_id))?;

    if !chat.has_participant(reader_id) {
        return Ok(());
    }

    let mut fields = Fields::new();
    fields.insert(
        format!("unread_counts.{reader_id}"),
        json!(chat.unread_for(reader_id).saturating_sub(1)),
    );
    store
        .update(CHATS, &chat.id, fields)
        .map_err(map_store_error)
}

/// Decides which observed messages need a read receipt from the viewer.
///
/// A receipt is requested once per message: messages the viewer sent or has
/// already read are skipped, as are messages handled in an earlier batch. A
/// receipt that fails is requested again on the next batch.
#[derive(Debug)]
pub struct ReadReceiptTracker {
    viewer: SessionContext,
    requested: HashSet<String>,
}

impl ReadReceiptTracker {
    pub fn new(viewer: SessionContext) -> Self {
        Self {
            viewer,
            requested: HashSet::new(),
        }
    }

    /// Returns the messages of `batch` that still need a receipt and records
    /// them as requested.
    pub fn take_unread<'a>(&mut self, batch: &'a [Message]) -> Vec<&'a Message> {
        if self.viewer.user_id().is_empty() {
            return Vec::new();
        }

        batch
            .iter()
            .filter(|message| !self.viewer.is_current_user(&message.sender_id))
            .filter(|message| !message.is_read_by(self.viewer.user_id()))
            .filter(|message| self.requested.insert(message.id.clone()))
            .collect()
    }

    /// Marks every unread message of `batch` as read by the viewer.
    ///
    /// Returns the number of messages newly marked.
    pub fn acknowledge(&mut self, store: &dyn DocumentStore, batch: &[Message]) -> usize {
        let mut marked = 0;
        for message in self.take_unread(batch) {
            match mark_read(store, &message.id, &message.chat_id, self.viewer.user_id()) {
                Ok(ReadOutcome::Marked) => marked += 1,
                Ok(ReadOutcome::AlreadyRead) => {}
                Err(error) => {
                    tracing::warn!(
                        code = READ_RECEIPT_FAILED,
                        message_id = %message.id,
                        error = %error,
                        "read receipt failed; will retry on next batch"
                    );
                    self.requested.remove(&message.id);
                }
            }
        }
        marked
    }
}
