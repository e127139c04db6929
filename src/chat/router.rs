//! Routing of chat messages to rooms.
//!
//! A message is validated, rewritten for display, persisted, and then
//! emitted to every session in its room. Lobby messages reach every
//! connected session; table messages reach the table's players and
//! spectators and are appended to the table's in-memory log. Table
//! messages are emitted from the table's outbox, in log order.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::emitter::{SessionEmitter, SessionInfo};
use super::log::{ChatAuthor, ChatLogRepository, NewChatLog, SERVER_NAME};
use super::message::{ChatMessage, ServerEvent};
use super::rewrite::TokenRewriter;
use super::LOBBY_ROOM;
use crate::config::ChatConfig;
use crate::db::Database;
use crate::table::{Table, TableRegistry};
use crate::{ChatError, Result};

/// Who is sending a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatSender {
    /// A connected participant.
    Participant(SessionInfo),
    /// The server itself.
    Server,
    /// A user on the external platform, by display name.
    External(String),
}

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub sender: ChatSender,
    pub msg: String,
    pub room: String,
}

impl ChatRequest {
    pub fn participant(
        session: SessionInfo,
        msg: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            sender: ChatSender::Participant(session),
            msg: msg.into(),
            room: room.into(),
        }
    }

    pub fn server(msg: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::Server,
            msg: msg.into(),
            room: room.into(),
        }
    }

    pub fn external(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::External(name.into()),
            msg: msg.into(),
            room: LOBBY_ROOM.to_string(),
        }
    }
}

/// Routes chat messages to the lobby, tables and individual sessions.
pub struct ChatRouter {
    registry: Arc<TableRegistry>,
    emitter: Arc<dyn SessionEmitter>,
    db: Database,
    rewriter: TokenRewriter,
    config: ChatConfig,
}

impl ChatRouter {
    pub fn new(
        registry: Arc<TableRegistry>,
        emitter: Arc<dyn SessionEmitter>,
        db: Database,
        rewriter: TokenRewriter,
        config: ChatConfig,
    ) -> Self {
        Self {
            registry,
            emitter,
            db,
            rewriter,
            config,
        }
    }

    /// Name server notices are displayed under.
    pub fn server_name(&self) -> &str {
        &self.config.website_name
    }

    /// Route a chat message and return it as delivered.
    ///
    /// When a participant's message is rejected, that participant is told
    /// why before the error is returned.
    pub async fn send(&self, request: ChatRequest) -> Result<ChatMessage> {
        let result = self.route(&request).await;
        if let (Err(e), ChatSender::Participant(session)) = (&result, &request.sender) {
            self.notify_rejected(session, e);
        }
        result
    }

    /// Send a server notice to one room.
    pub async fn send_from_server(&self, msg: &str, room: &str) -> Result<ChatMessage> {
        self.send(ChatRequest::server(msg, room)).await
    }

    /// Relay a message from the external platform to the lobby.
    pub async fn send_from_bridge(&self, external_name: &str, msg: &str) -> Result<ChatMessage> {
        self.send(ChatRequest::external(external_name, msg)).await
    }

    /// Send a server notice to the lobby and to every live table.
    ///
    /// Rooms are notified one after another from a single registry snapshot;
    /// a failure in one room is logged and does not stop the rest. Returns
    /// the number of rooms a send was attempted for.
    pub async fn broadcast_from_server(&self, msg: &str) -> usize {
        let mut rooms = vec![LOBBY_ROOM.to_string()];
        rooms.extend(
            self.registry
                .inspect_each(|table, _| table.room_name().to_string())
                .await,
        );

        for room in &rooms {
            match self.send_from_server(msg, room).await {
                Ok(_) => {}
                Err(ChatError::NotFound(what)) => {
                    debug!("Skipping broadcast to {}: {} not found", room, what);
                }
                Err(e) => warn!("Failed to broadcast to {}: {}", room, e),
            }
        }

        info!(rooms = rooms.len(), "broadcast server message");
        rooms.len()
    }

    /// Send a private server message to one session. It is never persisted.
    pub fn send_private(&self, msg: &str, recipient: &SessionInfo, room: &str) -> Result<()> {
        let message = ChatMessage::server(self.server_name(), self.rewriter.rewrite(msg), room)
            .to_recipient(&recipient.username);
        self.emitter
            .emit(&recipient.session_id, &ServerEvent::Chat(message))
    }

    async fn route(&self, request: &ChatRequest) -> Result<ChatMessage> {
        let body = request.msg.trim();
        if body.is_empty() {
            return Err(ChatError::Validation(
                "chat messages cannot be empty".to_string(),
            ));
        }
        if let ChatSender::Participant(session) = &request.sender {
            if body.chars().count() > self.config.max_message_length {
                return Err(ChatError::Validation(format!(
                    "chat messages cannot be longer than {} characters",
                    self.config.max_message_length
                )));
            }
            // Stored server notices are named after the sentinel.
            if session.username == SERVER_NAME {
                return Err(ChatError::Validation(format!(
                    "the name {SERVER_NAME} is reserved"
                )));
            }
        }

        let display = self.rewriter.rewrite(body);
        let room = request.room.as_str();
        let message = match &request.sender {
            ChatSender::Participant(session) => {
                ChatMessage::participant(&session.username, display, room)
            }
            ChatSender::Server => ChatMessage::server(self.server_name(), display, room),
            ChatSender::External(name) => ChatMessage::external(name, display, room),
        };
        let record = NewChatLog::new(room, ChatAuthor::of(&message), body).at(message.datetime);

        let emitted = if room == LOBBY_ROOM {
            self.persist(&record).await?;
            self.deliver(&self.emitter.connected_sessions(), &message)
        } else {
            let table = self.append_to_table(request, &message, &record).await?;
            self.flush_table(&table).await
        };

        debug!(room = %room, emitted, "chat message routed");
        Ok(message)
    }

    /// Persist a table message and append it to the table's log.
    async fn append_to_table(
        &self,
        request: &ChatRequest,
        message: &ChatMessage,
        record: &NewChatLog,
    ) -> Result<Arc<Table>> {
        let not_found = || ChatError::NotFound(format!("room {}", request.room));
        let table = self
            .registry
            .table_for_room(&request.room)
            .await
            .ok_or_else(not_found)?;

        {
            let state = table.lock().await;
            if state.is_closed() {
                return Err(not_found());
            }
            if let ChatSender::Participant(session) = &request.sender {
                if !state.is_participant(session.user_id) {
                    return Err(ChatError::Validation(
                        "you are not playing or spectating at this table".to_string(),
                    ));
                }
            }
        }

        let id = self.persist(record).await?;
        self.commit_to_table(&table, message.clone(), id).await?;
        Ok(table)
    }

    /// Append a persisted message to its table's log.
    ///
    /// If the table was removed while the record was being written, the
    /// record is deleted again and the send fails as if the room never
    /// existed.
    async fn commit_to_table(&self, table: &Table, message: ChatMessage, id: i64) -> Result<()> {
        {
            let mut state = table.lock().await;
            if !state.is_closed() {
                state.append_chat(message);
                return Ok(());
            }
        }

        debug!(table_id = table.id(), log_id = id, "table closed during send");
        if let Err(e) = ChatLogRepository::new(self.db.pool()).delete(id).await {
            warn!("Failed to delete chat log {} of a closed table: {}", id, e);
        }
        Err(ChatError::NotFound(format!("room {}", table.room_name())))
    }

    /// Emit everything queued at a table, oldest first.
    ///
    /// Only one task flushes a table at a time, so every recipient sees the
    /// table's messages in log order. Returns how many emits succeeded.
    async fn flush_table(&self, table: &Table) -> usize {
        let _turn = table.delivery_turn().await;
        let pending = table.lock().await.take_outbox();
        pending
            .iter()
            .map(|p| self.deliver(&p.sessions, &p.message))
            .sum()
    }

    async fn persist(&self, record: &NewChatLog) -> Result<i64> {
        ChatLogRepository::new(self.db.pool())
            .save(record)
            .await
            .map_err(|e| {
                error!("Failed to insert a chat message into {}: {}", record.room, e);
                e
            })
    }

    /// Emit to each session in turn. Returns how many emits succeeded.
    fn deliver(&self, sessions: &[String], message: &ChatMessage) -> usize {
        let event = ServerEvent::Chat(message.clone());
        let mut delivered = 0;
        for session_id in sessions {
            match self.emitter.emit(session_id, &event) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    session_id = %session_id,
                    room = %message.room,
                    "Failed to deliver chat message: {}",
                    e
                ),
            }
        }
        delivered
    }

    fn notify_rejected(&self, session: &SessionInfo, err: &ChatError) {
        let event = match err {
            ChatError::Validation(reason) => ServerEvent::Warning {
                warning: capitalize(reason),
            },
            ChatError::NotFound(_) => ServerEvent::Warning {
                warning: "That room does not exist.".to_string(),
            },
            _ => ServerEvent::generic_error(),
        };
        if let Err(e) = self.emitter.emit(&session.session_id, &event) {
            debug!("Failed to notify {}: {}", session.username, e);
        }
    }
}

fn capitalize(reason: &str) -> String {
    let mut chars = reason.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}
