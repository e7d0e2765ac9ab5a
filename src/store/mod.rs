//! Document store integration: the store contract, the query model, an
//! in-memory implementation and the document/record normalizer.

pub mod contract;
pub mod document;
pub mod error;
pub mod memory;
pub mod normalize;
pub mod query;

pub use contract::{DocumentStore, ListenerRegistration, SnapshotListener};
pub use document::{Document, Fields};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use query::{Direction, Query};

pub const CHATS: &str = "chats";
pub const MESSAGES: &str = "messages";
pub const USERS: &str = "users";
