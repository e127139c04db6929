//! tablechat - chat subsystem for multiplayer game tables.
//!
//! Routes chat between a shared lobby and per-table rooms, persists it,
//! and replays backlogs to participants when they connect.

pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod table;

pub use chat::{
    ChannelEmitter, ChatHistory, ChatListMessage, ChatMessage, ChatOrigin, ChatRequest,
    ChatRouter, ChatSender, DirectoryResolver, MentionResolver, ServerEvent, SessionEmitter,
    SessionInfo, TokenRewriter, CHAT_LIMIT, LOBBY_ROOM,
};
pub use config::Config;
pub use db::Database;
pub use error::{ChatError, ErrorKind, Result};
pub use table::{Table, TableParticipant, TableRegistry};
