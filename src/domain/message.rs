use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// Sender id stored when an outgoing message carries a blank sender.
pub const UNKNOWN_SENDER: &str = "unknown_sender";

/// Kind of message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    File,
    System,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
        }
    }

    /// Parses a stored kind, case-insensitively. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "file" => Some(Self::File),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Returns a display label for non-text kinds, or None for plain text.
    pub fn display_label(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Image => Some("[Image]"),
            Self::File => Some("[File]"),
            Self::System => Some("[System]"),
        }
    }
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum MessageStatus {
    Sending,
    #[default]
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sending" => Some(Self::Sending),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_name: Option<String>,
    pub content: String,
    pub kind: MessageKind,
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
    /// Participants who have read this message. Includes the sender.
    pub read_by: BTreeSet<String>,
}

impl Message {
    /// Returns true when `user_id` sent this message.
    ///
    /// Both sides are trimmed, so stray whitespace in stored or session ids
    /// never turns an own message into a foreign one.
    pub fn is_from(&self, user_id: &str) -> bool {
        let user_id = user_id.trim();
        !user_id.is_empty() && self.sender_id.trim() == user_id
    }

    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.contains(user_id.trim())
    }

    /// Returns the display content: kind label + text, or just text.
    pub fn display_content(&self) -> String {
        match (self.kind.display_label(), self.content.is_empty()) {
            (Some(label), true) => label.to_owned(),
            (Some(label), false) => format!("{} {}", label, self.content),
            (None, _) => self.content.clone(),
        }
    }
}

/// Trims a sender id, substituting [`UNKNOWN_SENDER`] when nothing is left.
///
/// Returns the sanitized id and whether the sentinel was substituted.
pub fn sanitize_sender_id(raw: &str) -> (String, bool) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        (UNKNOWN_SENDER.to_owned(), true)
    } else {
        (trimmed.to_owned(), false)
    }
}
