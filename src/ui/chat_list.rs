//! Chat list row formatting.

use chrono::{DateTime, Local, Utc};

use crate::{
    domain::chat::{Chat, ChatKind},
    usecases::{context::SessionContext, display_names::NameCache},
};

/// Title shown for a chat: its name, the counterpart for direct chats, or
/// the participant list.
pub fn chat_title(chat: &Chat, viewer: &SessionContext, names: &NameCache) -> String {
    if let Some(name) = &chat.name {
        return name.clone();
    }

    let label = |user_id: &str| {
        names
            .cached(user_id)
            .map(str::to_owned)
            .unwrap_or_else(|| user_id.to_owned())
    };

    if chat.kind == ChatKind::Direct {
        if let Some(other) = chat.other_participant(viewer.user_id()) {
            return label(other);
        }
    }

    chat.participants
        .iter()
        .filter(|p| !viewer.is_current_user(p))
        .map(|p| label(p))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One chat list row: `time | title preview [unread]`, fitted to `width`.
pub fn chat_row(chat: &Chat, viewer: &SessionContext, names: &NameCache, width: usize) -> String {
    let timestamp = chat
        .last_message
        .as_ref()
        .map(|summary| format_chat_timestamp(summary.sent_at))
        .unwrap_or_default();

    let preview = chat
        .last_message
        .as_ref()
        .map(|summary| {
            let text = normalize_preview_for_chat_row(&summary.content);
            let text = match summary.kind.display_label() {
                Some(label) if text.is_empty() => label.to_owned(),
                Some(label) => format!("{label} {text}"),
                None => text,
            };
            if viewer.is_current_user(&summary.sender_id) {
                format!("You: {text}")
            } else if chat.kind != ChatKind::Direct {
                let sender = names
                    .cached(&summary.sender_id)
                    .unwrap_or(summary.sender_id.as_str());
                format!("{sender}: {text}")
            } else {
                text
            }
        })
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "No messages yet".to_owned());

    let unread = chat.unread_for(viewer.user_id());
    let badge = if unread > 0 {
        format!(" [{unread}]")
    } else {
        String::new()
    };

    let head = format!("{timestamp:>5} | {} ", chat_title(chat, viewer, names));
    let available = width.saturating_sub(head.chars().count() + badge.chars().count());
    let preview_len = preview.chars().count();
    let (preview, padding) = if preview_len <= available {
        (preview, available - preview_len)
    } else {
        let truncated: String = preview.chars().take(available.saturating_sub(3)).collect();
        (format!("{truncated}..."), 0)
    };

    format!("{head}{preview}{}{badge}", " ".repeat(padding))
}

fn format_chat_timestamp(at: DateTime<Utc>) -> String {
    let local = at.with_timezone(&Local);
    if local.date_naive() == Local::now().date_naive() {
        local.format("%H:%M").to_string()
    } else {
        local.format("%d.%m").to_string()
    }
}

fn normalize_preview_for_chat_row(preview: &str) -> String {
    preview.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{chat::LastMessage, message::MessageKind};

    fn chat(kind: ChatKind, participants: &[&str], last: Option<(&str, &str)>) -> Chat {
        let at = Utc::now();
        Chat {
            id: "c1".to_owned(),
            kind,
            name: None,
            participants: participants.iter().map(|p| (*p).to_owned()).collect(),
            project_id: None,
            created_at: at,
            updated_at: at,
            last_message: last.map(|(sender, content)| LastMessage {
                message_id: "m1".to_owned(),
                content: content.to_owned(),
                sender_id: sender.to_owned(),
                kind: MessageKind::Text,
                sent_at: at,
            }),
            unread_counts: BTreeMap::from([("me".to_owned(), 3)]),
        }
    }

    #[test]
    fn direct_chat_is_titled_by_counterpart() {
        let mut names = NameCache::new();
        names.remember("bob", "Bob");
        let chat = chat(ChatKind::Direct, &["me", "bob"], None);

        assert_eq!(chat_title(&chat, &SessionContext::new(" me "), &names), "Bob");
    }

    #[test]
    fn unnamed_group_lists_other_participants() {
        let chat = chat(ChatKind::Group, &["me", "bob", "carol"], None);

        assert_eq!(
            chat_title(&chat, &SessionContext::new("me"), &NameCache::new()),
            "bob, carol"
        );
    }

    #[test]
    fn row_shows_preview_and_unread_badge() {
        let chat = chat(ChatKind::Group, &["me", "bob"], Some(("bob", "see   you\nsoon")));

        let row = chat_row(&chat, &SessionContext::new("me"), &NameCache::new(), 60);

        assert!(row.contains("| bob bob: see you soon"));
        assert!(row.ends_with(" [3]"));
        assert_eq!(row.chars().count(), 60);
    }

    #[test]
    fn own_last_message_is_prefixed_with_you() {
        let chat = chat(ChatKind::Direct, &["me", "bob"], Some((" me", "done")));

        let row = chat_row(&chat, &SessionContext::new("me"), &NameCache::new(), 80);

        assert!(row.contains("bob You: done"));
    }

    #[test]
    fn empty_chat_says_no_messages() {
        let chat = chat(ChatKind::Direct, &["me", "bob"], None);

        let row = chat_row(&chat, &SessionContext::new("me"), &NameCache::new(), 80);

        assert!(row.contains("No messages yet"));
    }

    #[test]
    fn long_preview_is_truncated() {
        let long = "x".repeat(100);
        let chat = chat(ChatKind::Direct, &["me", "bob"], Some(("bob", long.as_str())));

        let row = chat_row(&chat, &SessionContext::new("me"), &NameCache::new(), 40);

        assert!(row.contains("..."));
        assert!(row.chars().count() <= 44);
    }
}
