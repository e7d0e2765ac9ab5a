//! UI layer: plain-text rendering of chat lists and message lists.

pub mod chat_list;
pub mod message_rendering;
