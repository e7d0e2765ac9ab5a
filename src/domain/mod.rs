//! Domain layer: core entities and view state.

pub mod chat;
pub mod message;
pub mod open_chat_state;
pub mod resource;
