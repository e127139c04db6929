//! Chat module for tablechat.
//!
//! This module provides the chat subsystem:
//! - Message and event types sent to sessions
//! - Token rewriting of platform mentions and spoilers
//! - Durable chat log storage
//! - Routing to the lobby, tables and single sessions
//! - Backlog replay for newly connected participants

mod emitter;
mod history;
pub mod log;
mod message;
mod rewrite;
mod router;

pub use emitter::{ChannelEmitter, SessionEmitter, SessionInfo};
pub use history::ChatHistory;
pub use log::{ChatAuthor, ChatLog, ChatLogRepository, NewChatLog, SERVER_NAME};
pub use message::{ChatListMessage, ChatMessage, ChatOrigin, ServerEvent};
pub use rewrite::{DirectoryResolver, MentionResolver, TokenRewriter};
pub use router::{ChatRequest, ChatRouter, ChatSender};

/// Maximum number of table messages returned in one backlog.
pub const CHAT_LIMIT: usize = 1000;

/// Room shared by every connected session.
pub const LOBBY_ROOM: &str = "lobby";

/// Error shown to a participant when something fails on our side.
pub const DEFAULT_ERROR_MSG: &str = "Something went wrong. Please contact an administrator.";
