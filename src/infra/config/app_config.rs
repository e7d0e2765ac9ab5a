use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::usecases::load_messages::MAX_MESSAGES_PER_CHAT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub store: StoreConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Snapshot file backing the document store. Resolved under the platform
    /// data directory when unset.
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatConfig {
    /// Participant acting in this session.
    pub user_id: String,
    pub message_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            message_limit: MAX_MESSAGES_PER_CHAT,
        }
    }
}
