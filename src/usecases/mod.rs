//! Use case layer: chat synchronization, outgoing messages, read state and
//! chat lifecycle over a [`crate::store::DocumentStore`].

pub mod bootstrap;
pub mod context;
pub mod display_names;
pub mod error;
pub mod list_chats;
pub mod load_messages;
pub mod manage_chats;
pub mod mark_read;
pub mod send_message;
pub mod subscribe;
