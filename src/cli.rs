use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::{chat::ChatKind, message::MessageKind};

#[derive(Debug, Parser)]
#[command(name = "chatsync", about = "Chat synchronization over a document store snapshot")]
pub struct Cli {
    /// Path to config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store snapshot file (overrides store.snapshot_path)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Acting user id (overrides chat.user_id)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the user's chats, direct chats merged per counterpart
    Chats,
    /// List the chats of a project
    ProjectChats { project_id: String },
    /// Show a chat's messages and mark them read
    Messages {
        chat_id: String,
        /// Most recent messages to show (0 = maximum)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// Print a chat's stored messages once, without read receipts
    History {
        chat_id: String,
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// Send a message
    Send {
        chat_id: String,
        content: String,
        #[arg(long, value_enum, default_value_t = KindArg::Text)]
        kind: KindArg,
        /// Client-generated message id
        #[arg(long)]
        id: Option<String>,
    },
    /// Create a chat with the acting user as first participant
    CreateChat {
        #[arg(long, value_enum, default_value_t = ChatKindArg::Group)]
        kind: ChatKindArg,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// Other participants
        #[arg(required = true)]
        participants: Vec<String>,
    },
    /// Open (or create) the direct chat with another user
    Direct { other_user: String },
    /// Mark one message read by the acting user
    MarkRead { chat_id: String, message_id: String },
    /// Delete one message
    DeleteMessage { chat_id: String, message_id: String },
    /// Delete a chat and its messages
    DeleteChat { chat_id: String },
    /// Add a participant to a group or project chat
    Join { chat_id: String, user_id: String },
    /// Remove a participant from a group or project chat
    Leave { chat_id: String, user_id: String },
}

impl Command {
    /// Whether the command may write to the store. Showing messages counts:
    /// it records read receipts.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Self::Chats | Self::ProjectChats { .. } | Self::History { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Text,
    Image,
    File,
    System,
}

impl From<KindArg> for MessageKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Text => Self::Text,
            KindArg::Image => Self::Image,
            KindArg::File => Self::File,
            KindArg::System => Self::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChatKindArg {
    Direct,
    Group,
    Project,
}

impl From<ChatKindArg> for ChatKind {
    fn from(value: ChatKindArg) -> Self {
        match value {
            ChatKindArg::Direct => Self::Direct,
            ChatKindArg::Group => Self::Group,
            ChatKindArg::Project => Self::Project,
        }
    }
}
