//! Test helpers for integration tests.
//!
//! Provides a recording emitter and a chat fixture backed by an in-memory
//! database.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tablechat::config::ChatConfig;
use tablechat::{
    ChatError, ChatHistory, ChatRouter, Database, DirectoryResolver, ServerEvent, SessionEmitter,
    TableParticipant, TableRegistry, TokenRewriter,
};

/// Emitter that records every emit attempt.
///
/// Sessions listed as failing still have their attempt recorded, but the
/// emit returns an error.
#[derive(Default)]
pub struct RecordingEmitter {
    connected: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<(String, ServerEvent)>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, session_id: &str) {
        self.connected.lock().unwrap().push(session_id.to_string());
    }

    pub fn fail(&self, session_id: &str) {
        self.failing.lock().unwrap().insert(session_id.to_string());
    }

    pub fn attempts(&self) -> Vec<(String, ServerEvent)> {
        self.attempts.lock().unwrap().clone()
    }

    /// Chat events successfully delivered to one session, in order.
    pub fn chats_for(&self, session_id: &str) -> Vec<tablechat::ChatMessage> {
        let failing = self.failing.lock().unwrap();
        self.attempts()
            .into_iter()
            .filter(|(id, _)| id == session_id && !failing.contains(id))
            .filter_map(|(_, event)| match event {
                ServerEvent::Chat(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Rooms of every chat emit attempt, in order.
    pub fn chat_rooms(&self) -> Vec<String> {
        self.attempts()
            .into_iter()
            .filter_map(|(_, event)| match event {
                ServerEvent::Chat(msg) => Some(msg.room),
                _ => None,
            })
            .collect()
    }
}

impl SessionEmitter for RecordingEmitter {
    fn emit(&self, session_id: &str, event: &ServerEvent) -> tablechat::Result<()> {
        self.attempts
            .lock()
            .unwrap()
            .push((session_id.to_string(), event.clone()));
        if self.failing.lock().unwrap().contains(session_id) {
            return Err(ChatError::Emit(format!("{session_id} is gone")));
        }
        Ok(())
    }

    fn connected_sessions(&self) -> Vec<String> {
        self.connected.lock().unwrap().clone()
    }
}

/// A fully wired chat stack.
pub struct ChatFixture {
    pub db: Database,
    pub registry: Arc<TableRegistry>,
    pub emitter: Arc<RecordingEmitter>,
    pub router: Arc<ChatRouter>,
    pub history: ChatHistory,
}

impl ChatFixture {
    pub async fn new() -> Self {
        Self::with_config(ChatConfig::default()).await
    }

    pub async fn with_config(config: ChatConfig) -> Self {
        let db = Database::open_in_memory().await.unwrap();
        let registry = Arc::new(TableRegistry::new(config.table_chat_limit));
        let emitter = Arc::new(RecordingEmitter::new());
        let resolver = DirectoryResolver::new()
            .with_user("123456789012345678", "bob")
            .with_role("223456789012345678", "moderators")
            .with_channel("323456789012345678", "general");
        let rewriter = TokenRewriter::new(Arc::new(resolver));

        let router = Arc::new(ChatRouter::new(
            registry.clone(),
            emitter.clone(),
            db.clone(),
            rewriter.clone(),
            config.clone(),
        ));
        let history = ChatHistory::new(db.clone(), emitter.clone(), rewriter, &config);

        Self {
            db,
            registry,
            emitter,
            router,
            history,
        }
    }

    /// Create a table seating one player per name; session IDs are `s-{name}`.
    pub async fn table_with(&self, players: &[&str]) -> Arc<tablechat::Table> {
        let table = self.registry.create_table("test table").await;
        {
            let mut state = table.lock().await;
            for (i, name) in players.iter().enumerate() {
                state.join(TableParticipant::player(
                    i as i64 + 1,
                    *name,
                    format!("s-{name}"),
                ));
            }
        }
        table
    }
}
