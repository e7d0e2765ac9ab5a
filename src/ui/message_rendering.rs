//! Message list rendering logic.
//!
//! Handles plain-text formatting of messages including:
//! - Sender grouping (consecutive messages from same sender show name only once)
//! - Date separators between messages from different days
//! - Delivery marks on the viewer's own messages

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::{
    domain::message::{Message, MessageStatus},
    usecases::{context::SessionContext, display_names::NameCache},
};

const INDENT: &str = "      ";

/// Represents a visual element in the messages list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageListElement {
    /// Date separator line (e.g., "--- 14 Feb 2026 ---").
    DateSeparator(String),
    /// A message with optional sender display.
    Message {
        time: String,
        sender: Option<String>,
        content: String,
        mark: Option<&'static str>,
    },
}

/// Builds a list of visual elements from messages ordered oldest first.
///
/// Groups consecutive messages from the same sender and inserts date separators.
pub fn build_message_list_elements(
    messages: &[Message],
    viewer: &SessionContext,
    names: &NameCache,
) -> Vec<MessageListElement> {
    let mut elements = Vec::new();
    let mut prev_date: Option<NaiveDate> = None;
    let mut prev_sender: Option<&str> = None;

    for message in messages {
        let msg_date = local_date(message.sent_at);

        if prev_date != Some(msg_date) {
            elements.push(MessageListElement::DateSeparator(format_date(msg_date)));
            prev_sender = None;
        }

        let sender_id = message.sender_id.trim();
        let sender = (prev_sender != Some(sender_id))
            .then(|| sender_label(message, viewer, names));

        elements.push(MessageListElement::Message {
            time: format_time(message.sent_at),
            sender,
            content: message.display_content(),
            mark: viewer
                .is_current_user(&message.sender_id)
                .then(|| delivery_mark(message)),
        });

        prev_date = Some(msg_date);
        prev_sender = Some(sender_id);
    }

    elements
}

/// Renders elements to printable lines.
pub fn render_message_list(elements: &[MessageListElement]) -> Vec<String> {
    let mut lines = Vec::new();

    for element in elements {
        match element {
            MessageListElement::DateSeparator(date) => lines.push(format!("--- {date} ---")),
            MessageListElement::Message {
                time,
                sender,
                content,
                mark,
            } => {
                let mark = mark.map(|mark| format!(" {mark}")).unwrap_or_default();
                let mut content_lines = content.lines();

                if let Some(name) = sender {
                    lines.push(format!("{time:>5} {name}:{mark}"));
                    let mut any = false;
                    for text_line in content_lines {
                        lines.push(format!("{INDENT}{text_line}"));
                        any = true;
                    }
                    if !any {
                        lines.push(format!("{INDENT}[Empty message]"));
                    }
                } else {
                    let first = content_lines.next().unwrap_or("[Empty message]");
                    lines.push(format!("{time:>5} {first}{mark}"));
                    for text_line in content_lines {
                        lines.push(format!("{INDENT}{text_line}"));
                    }
                }
            }
        }
    }

    lines
}

fn sender_label(message: &Message, viewer: &SessionContext, names: &NameCache) -> String {
    if viewer.is_current_user(&message.sender_id) {
        return "You".to_owned();
    }

    names
        .cached(&message.sender_id)
        .map(str::to_owned)
        .or_else(|| message.sender_name.clone())
        .unwrap_or_else(|| message.sender_id.trim().to_owned())
}

/// Mark shown next to the viewer's own messages.
fn delivery_mark(message: &Message) -> &'static str {
    let read_by_others = message.read_by.iter().any(|reader| !message.is_from(reader));
    match message.status {
        MessageStatus::Sending => "...",
        _ if read_by_others || message.status == MessageStatus::Read => "\u{2713}\u{2713}",
        MessageStatus::Delivered => "\u{2713}",
        _ => "\u{2022}",
    }
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

fn format_date(date: NaiveDate) -> String {
    date.format("%-d %b %Y").to_string()
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M").to_string()
}
