use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::message::{Message, MessageKind};

/// Type of chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatKind {
    /// One-on-one conversation between exactly two participants.
    Direct,
    #[default]
    Group,
    /// Chat attached to a project.
    Project,
}

impl ChatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Project => "project",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            "project" => Some(Self::Project),
            _ => None,
        }
    }
}

/// Denormalized copy of the most recent message, stored on the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub message_id: String,
    pub content: String,
    pub sender_id: String,
    pub kind: MessageKind,
    pub sent_at: DateTime<Utc>,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.id.clone(),
            content: message.content.clone(),
            sender_id: message.sender_id.clone(),
            kind: message.kind,
            sent_at: message.sent_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: String,
    pub kind: ChatKind,
    pub name: Option<String>,
    pub participants: Vec<String>,
    pub project_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
    /// Unread message count per participant.
    pub unread_counts: BTreeMap<String, u32>,
}

impl Chat {
    pub fn has_participant(&self, user_id: &str) -> bool {
        let user_id = user_id.trim();
        self.participants.iter().any(|p| p.trim() == user_id)
    }

    /// Resolves the counterpart of `me` in a direct chat.
    ///
    /// Returns `None` unless exactly one participant other than `me` exists.
    pub fn other_participant(&self, me: &str) -> Option<&str> {
        let me = me.trim();
        let mut others = self
            .participants
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty() && *p != me);

        let other = others.next()?;
        if others.next().is_some() {
            return None;
        }

        Some(other)
    }

    pub fn unread_for(&self, user_id: &str) -> u32 {
        self.unread_counts
            .get(user_id.trim())
            .copied()
            .unwrap_or(0)
    }
}
