use super::{
    message::{Message, MessageStatus},
    resource::Resource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenChatUiState {
    Empty,
    Loading,
    Ready,
    Error,
}

/// View state of the chat currently open.
///
/// Messages sent from this client are shown immediately as pending entries.
/// When the live subscription delivers a stored message with the same id, the
/// stored copy replaces the pending one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChatState {
    chat_id: Option<String>,
    chat_title: String,
    confirmed: Vec<Message>,
    pending: Vec<Message>,
    ui_state: OpenChatUiState,
    last_error: Option<String>,
}

impl Default for OpenChatState {
    fn default() -> Self {
        Self {
            chat_id: None,
            chat_title: String::new(),
            confirmed: Vec::new(),
            pending: Vec::new(),
            ui_state: OpenChatUiState::Empty,
            last_error: None,
        }
    }
}

impl OpenChatState {
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn chat_title(&self) -> &str {
        &self.chat_title
    }

    pub fn ui_state(&self) -> OpenChatUiState {
        self.ui_state.clone()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Returns stored messages followed by still-pending local ones, ordered
    /// by send time.
    pub fn messages(&self) -> Vec<Message> {
        let mut merged = self.confirmed.clone();
        merged.extend(self.pending.iter().cloned());
        merged.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        merged
    }

    pub fn set_loading(&mut self, chat_id: &str, chat_title: String) {
        self.chat_id = Some(chat_id.to_owned());
        self.chat_title = chat_title;
        self.confirmed.clear();
        self.pending.clear();
        self.ui_state = OpenChatUiState::Loading;
        self.last_error = None;
    }

    /// Applies one emission of a message subscription.
    ///
    /// An error keeps the last good batch on screen.
    pub fn apply(&mut self, emission: Resource<Vec<Message>>) {
        match emission {
            Resource::Loading => {
                if self.confirmed.is_empty() {
                    self.ui_state = OpenChatUiState::Loading;
                }
            }
            Resource::Success(messages) => self.set_ready(messages),
            Resource::Error(message) => {
                self.last_error = Some(message);
                self.ui_state = OpenChatUiState::Error;
            }
        }
    }

    pub fn set_ready(&mut self, messages: Vec<Message>) {
        self.pending
            .retain(|local| !messages.iter().any(|stored| stored.id == local.id));
        self.confirmed = messages;
        self.ui_state = OpenChatUiState::Ready;
        self.last_error = None;
    }

    /// Shows a locally constructed message before the store acknowledges it.
    ///
    /// Messages for another chat or without an id are ignored.
    pub fn push_pending(&mut self, mut message: Message) {
        if message.id.is_empty() || self.chat_id.as_deref() != Some(message.chat_id.as_str()) {
            return;
        }
        if self.confirmed.iter().any(|stored| stored.id == message.id) {
            return;
        }

        message.status = MessageStatus::Sending;
        self.pending.retain(|local| local.id != message.id);
        self.pending.push(message);
    }

    /// Drops a pending entry whose write failed.
    pub fn discard_pending(&mut self, message_id: &str) -> bool {
        let before = self.pending.len();
        self.pending.retain(|local| local.id != message_id);
        before != self.pending.len()
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_open(&self) -> bool {
        self.chat_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::domain::message::MessageKind;

    fn message(id: &str, sent_at_ms: i64) -> Message {
        Message {
            id: id.to_owned(),
            chat_id: "c1".to_owned(),
            sender_id: "alice".to_owned(),
            sender_name: None,
            content: format!("text {id}"),
            kind: MessageKind::Text,
            sent_at: DateTime::<Utc>::from_timestamp_millis(sent_at_ms).expect("valid timestamp"),
            status: MessageStatus::Sent,
            read_by: BTreeSet::from(["alice".to_owned()]),
        }
    }

    fn open_state() -> OpenChatState {
        let mut state = OpenChatState::default();
        state.set_loading("c1", "General".to_owned());
        state
    }

    #[test]
    fn default_state_is_empty() {
        let state = OpenChatState::default();

        assert_eq!(state.ui_state(), OpenChatUiState::Empty);
        assert!(!state.is_open());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn set_loading_transitions_correctly() {
        let state = open_state();

        assert_eq!(state.chat_id(), Some("c1"));
        assert_eq!(state.chat_title(), "General");
        assert_eq!(state.ui_state(), OpenChatUiState::Loading);
    }

    #[test]
    fn pending_message_is_visible_before_acknowledgement() {
        let mut state = open_state();
        state.apply(Resource::Success(vec![message("m1", 1_000)]));

        state.push_pending(message("local-1", 2_000));

        let messages = state.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].id, "local-1");
        assert_eq!(messages[1].status, MessageStatus::Sending);
    }

    #[test]
    fn stored_copy_replaces_pending_entry_with_same_id() {
        let mut state = open_state();
        state.push_pending(message("local-1", 2_000));

        state.apply(Resource::Success(vec![
            message("m1", 1_000),
            message("local-1", 2_000),
        ]));

        let messages = state.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(state.pending_count(), 0);
        assert_eq!(messages[1].status, MessageStatus::Sent);
    }

    #[test]
    fn error_keeps_last_good_batch() {
        let mut state = open_state();
        state.apply(Resource::Success(vec![message("m1", 1_000)]));

        state.apply(Resource::Error("permission denied".to_owned()));

        assert_eq!(state.ui_state(), OpenChatUiState::Error);
        assert_eq!(state.last_error(), Some("permission denied"));
        assert_eq!(state.messages().len(), 1);

        state.apply(Resource::Success(vec![message("m1", 1_000), message("m2", 1_500)]));
        assert_eq!(state.ui_state(), OpenChatUiState::Ready);
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn pending_for_other_chat_is_ignored() {
        let mut state = open_state();
        let mut foreign = message("local-9", 1_000);
        foreign.chat_id = "c2".to_owned();

        state.push_pending(foreign);

        assert_eq!(state.pending_count(), 0);
    }

    #[test]
    fn discard_pending_removes_failed_send() {
        let mut state = open_state();
        state.push_pending(message("local-1", 2_000));

        assert!(state.discard_pending("local-1"));
        assert!(!state.discard_pending("local-1"));
        assert!(state.messages().is_empty());
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut state = open_state();
        state.apply(Resource::Success(vec![message("m1", 1_000)]));

        state.clear();

        assert_eq!(state.ui_state(), OpenChatUiState::Empty);
        assert!(!state.is_open());
    }
}
