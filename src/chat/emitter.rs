//! Delivery of events to connected sessions.
//!
//! The transport is external; the router only needs a fire-and-forget
//! `emit`. `ChannelEmitter` is the in-process implementation: one unbounded
//! tokio channel per connected session, drained by that session's writer
//! task.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use super::message::ServerEvent;
use crate::{ChatError, Result};

/// Identity of a connected participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Connection ID.
    pub session_id: String,
    /// Account ID.
    pub user_id: i64,
    /// Display name.
    pub username: String,
}

impl SessionInfo {
    pub fn new(session_id: impl Into<String>, user_id: i64, username: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            username: username.into(),
        }
    }
}

/// Delivers events to connected sessions.
///
/// `emit` must not block: the router calls it for every recipient in turn.
pub trait SessionEmitter: Send + Sync {
    /// Deliver an event to one session.
    fn emit(&self, session_id: &str, event: &ServerEvent) -> Result<()>;

    /// IDs of every connected session. Lobby messages go to all of them.
    fn connected_sessions(&self) -> Vec<String>;
}

/// Emitter backed by one unbounded channel per session.
#[derive(Debug, Default)]
pub struct ChannelEmitter {
    sessions: RwLock<HashMap<String, mpsc::UnboundedSender<ServerEvent>>>,
}

impl ChannelEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return the receiving end of its event queue.
    ///
    /// Registering an existing ID replaces the previous queue.
    pub fn register(&self, session_id: impl Into<String>) -> mpsc::UnboundedReceiver<ServerEvent> {
        let session_id = session_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(session_id = %session_id, "session registered");
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id, tx);
        rx
    }

    /// Remove a session. Returns true if it was registered.
    pub fn unregister(&self, session_id: &str) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some();
        if removed {
            debug!(session_id = %session_id, "session unregistered");
        }
        removed
    }

    /// Number of registered sessions.
    pub fn count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SessionEmitter for ChannelEmitter {
    fn emit(&self, session_id: &str, event: &ServerEvent) -> Result<()> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let tx = sessions
            .get(session_id)
            .ok_or_else(|| ChatError::Emit(format!("session {session_id} is not connected")))?;
        tx.send(event.clone())
            .map_err(|_| ChatError::Emit(format!("session {session_id} has disconnected")))
    }

    fn connected_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
