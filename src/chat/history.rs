//! Chat backlog retrieval.
//!
//! Two sources feed a (re)joining participant: the durable log, used for the
//! lobby, and the in-memory log of a live table, which also reports how many
//! messages the participant has not read.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::emitter::{SessionEmitter, SessionInfo};
use super::log::ChatLogRepository;
use super::message::{ChatListMessage, ServerEvent};
use super::rewrite::TokenRewriter;
use super::LOBBY_ROOM;
use crate::config::ChatConfig;
use crate::db::Database;
use crate::table::Table;
use crate::Result;

/// Reads chat backlogs and sends them to participants.
pub struct ChatHistory {
    db: Database,
    emitter: Arc<dyn SessionEmitter>,
    rewriter: TokenRewriter,
    server_name: String,
    table_chat_limit: usize,
    lobby_history_count: usize,
}

impl ChatHistory {
    pub fn new(
        db: Database,
        emitter: Arc<dyn SessionEmitter>,
        rewriter: TokenRewriter,
        config: &ChatConfig,
    ) -> Self {
        Self {
            db,
            emitter,
            rewriter,
            server_name: config.website_name.clone(),
            table_chat_limit: config.table_chat_limit,
            lobby_history_count: config.lobby_history_count,
        }
    }

    /// Fetch the newest `count` stored messages of a room, oldest first.
    ///
    /// There are no read cursors for stored history, so `unread` is 0.
    pub async fn fetch_persisted(&self, room: &str, count: usize) -> Result<ChatListMessage> {
        let repo = ChatLogRepository::new(self.db.pool());
        let newest_first = repo.get_recent(room, count).await?;

        let list = newest_first
            .into_iter()
            .rev()
            .map(|log| log.into_message(&self.rewriter, &self.server_name))
            .collect();

        Ok(ChatListMessage { list, unread: 0 })
    }

    /// Read a table's chat backlog for a user.
    ///
    /// At most `table_chat_limit` messages are returned, but `unread` counts
    /// against every message the table has ever had, so it can exceed the
    /// length of the list.
    pub async fn fetch_table_backlog(&self, table: &Table, user_id: i64) -> ChatListMessage {
        let state = table.lock().await;
        ChatListMessage {
            list: state.chat.backlog(self.table_chat_limit),
            unread: state.chat.unread(user_id),
        }
    }

    /// Send a room's stored history to a session.
    ///
    /// On a database failure the session gets a generic error and false is
    /// returned. Nobody else is affected.
    pub async fn send_past_from_database(
        &self,
        session: &SessionInfo,
        room: &str,
        count: usize,
    ) -> bool {
        let backlog = match self.fetch_persisted(room, count).await {
            Ok(backlog) => backlog,
            Err(e) => {
                error!(
                    "Failed to get the chat history of room \"{}\" for user \"{}\": {}",
                    room, session.username, e
                );
                if let Err(e) = self
                    .emitter
                    .emit(&session.session_id, &ServerEvent::generic_error())
                {
                    debug!("Failed to notify {}: {}", session.username, e);
                }
                return false;
            }
        };

        debug!(
            room = %room,
            count = backlog.list.len(),
            "sending chat history to {}",
            session.username
        );
        if let Err(e) = self
            .emitter
            .emit(&session.session_id, &ServerEvent::ChatList(backlog))
        {
            warn!("Failed to send chat history to {}: {}", session.username, e);
            return false;
        }
        true
    }

    /// Send the configured amount of lobby history to a newly connected session.
    pub async fn send_lobby_history(&self, session: &SessionInfo) -> bool {
        self.send_past_from_database(session, LOBBY_ROOM, self.lobby_history_count)
            .await
    }

    /// Send a table's in-memory chat to a participant.
    pub async fn send_past_from_table(&self, session: &SessionInfo, table: &Table) -> Result<()> {
        let backlog = self.fetch_table_backlog(table, session.user_id).await;
        debug!(
            room = %table.room_name(),
            count = backlog.list.len(),
            unread = backlog.unread,
            "sending table chat to {}",
            session.username
        );
        self.emitter
            .emit(&session.session_id, &ServerEvent::ChatList(backlog))
    }

    /// Record that a participant has read everything in a table's chat.
    pub async fn mark_read(&self, table: &Table, user_id: i64) {
        table.lock().await.chat.mark_read(user_id);
    }
}
