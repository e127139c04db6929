//! Live game tables.
//!
//! This module provides:
//! - `Table`: one game room with its own lock-protected chat log
//! - `TableChatLog`: bounded in-memory chat with per-user read cursors
//! - `TableRegistry`: the shared collection of live tables

mod chat_log;
mod registry;
mod room;

pub use chat_log::TableChatLog;
pub use registry::TableRegistry;
pub use room::{parse_room, room_name, PendingDelivery, Table, TableParticipant, TableState};
