//! A live game table and its lock-protected state.

use std::collections::{HashMap, VecDeque};

use tokio::sync::{Mutex, MutexGuard};

use super::chat_log::TableChatLog;
use crate::chat::ChatMessage;

/// Prefix of every table's chat room ID.
const ROOM_PREFIX: &str = "table";

/// Chat room ID of a table.
pub fn room_name(table_id: u64) -> String {
    format!("{ROOM_PREFIX}{table_id}")
}

/// Parse a chat room ID back into a table ID.
pub fn parse_room(room: &str) -> Option<u64> {
    let digits = room.strip_prefix(ROOM_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A player or spectator seated at a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableParticipant {
    pub user_id: i64,
    pub username: String,
    pub session_id: String,
    pub spectator: bool,
}

impl TableParticipant {
    pub fn player(user_id: i64, username: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            session_id: session_id.into(),
            spectator: false,
        }
    }

    pub fn spectator(
        user_id: i64,
        username: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            spectator: true,
            ..Self::player(user_id, username, session_id)
        }
    }
}

/// A table message appended to the log but not yet emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery {
    /// Sessions seated when the message was appended.
    pub sessions: Vec<String>,
    pub message: ChatMessage,
}

/// Mutable state of a table. Only reachable through `Table::lock`.
#[derive(Debug)]
pub struct TableState {
    /// In-game chat.
    pub chat: TableChatLog,
    participants: HashMap<i64, TableParticipant>,
    outbox: VecDeque<PendingDelivery>,
    closed: bool,
}

impl TableState {
    fn new(chat_cap: usize) -> Self {
        Self {
            chat: TableChatLog::new(chat_cap),
            participants: HashMap::new(),
            outbox: VecDeque::new(),
            closed: false,
        }
    }

    /// Seat a participant. Returns false if the user was already seated,
    /// in which case the session is updated.
    pub fn join(&mut self, participant: TableParticipant) -> bool {
        self.chat.track(participant.user_id);
        self.participants
            .insert(participant.user_id, participant)
            .is_none()
    }

    /// Remove a participant. The read cursor survives for a later rejoin.
    pub fn leave(&mut self, user_id: i64) -> bool {
        self.participants.remove(&user_id).is_some()
    }

    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participants.contains_key(&user_id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Participants sorted by user ID.
    pub fn participants(&self) -> Vec<TableParticipant> {
        let mut list: Vec<TableParticipant> = self.participants.values().cloned().collect();
        list.sort_by_key(|p| p.user_id);
        list
    }

    /// Session IDs of everyone who should see the table's chat.
    pub fn session_ids(&self) -> Vec<String> {
        self.participants()
            .into_iter()
            .map(|p| p.session_id)
            .collect()
    }

    /// Append a message to the chat log and queue it for everyone seated.
    ///
    /// The outbox keeps log order; drain it with `take_outbox` while holding
    /// `Table::delivery_turn`.
    pub fn append_chat(&mut self, message: ChatMessage) {
        self.chat.push(message.clone());
        self.outbox.push_back(PendingDelivery {
            sessions: self.session_ids(),
            message,
        });
    }

    /// Remove and return every queued message, oldest first.
    pub fn take_outbox(&mut self) -> Vec<PendingDelivery> {
        self.outbox.drain(..).collect()
    }

    /// True once the table has been removed from the registry.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(super) fn close(&mut self) {
        self.closed = true;
    }
}

/// A live game table.
///
/// Every mutable field sits behind one mutex. Hold it only for in-memory
/// work: never across an emit, a database query, or another table's lock.
#[derive(Debug)]
pub struct Table {
    id: u64,
    name: String,
    room: String,
    state: Mutex<TableState>,
    delivery: Mutex<()>,
}

impl Table {
    /// Create a table whose chat log retains at most `chat_cap` messages.
    pub fn new(id: u64, name: impl Into<String>, chat_cap: usize) -> Self {
        Self {
            id,
            name: name.into(),
            room: room_name(id),
            state: Mutex::new(TableState::new(chat_cap)),
            delivery: Mutex::new(()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chat room ID of this table.
    pub fn room_name(&self) -> &str {
        &self.room
    }

    /// Acquire the table lock.
    pub async fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().await
    }

    /// Wait for the exclusive right to emit this table's outbox.
    ///
    /// Taken before `lock`, never while holding it.
    pub async fn delivery_turn(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().await
    }
}
