//! In-memory chat log of a single table.

use std::collections::{HashMap, VecDeque};

use crate::chat::ChatMessage;

/// Chat history of one live table.
///
/// Only the newest `cap` messages are retained, but `total` keeps counting so
/// read cursors stay meaningful after old messages fall off.
#[derive(Debug, Clone)]
pub struct TableChatLog {
    entries: VecDeque<ChatMessage>,
    cap: usize,
    total: usize,
    /// Read cursor per user ID, an index into `total`.
    cursors: HashMap<i64, usize>,
}

impl TableChatLog {
    /// Create an empty log retaining at most `cap` messages.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(64)),
            cap: cap.max(1),
            total: 0,
            cursors: HashMap::new(),
        }
    }

    /// Append a message, evicting the oldest one when full.
    pub fn push(&mut self, message: ChatMessage) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
        self.total += 1;
    }

    /// Number of messages ever appended.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of messages currently retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// The newest `limit` retained messages, oldest first.
    pub fn backlog(&self, limit: usize) -> Vec<ChatMessage> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Start tracking a user. An existing cursor is kept.
    pub fn track(&mut self, user_id: i64) {
        self.cursors.entry(user_id).or_insert(0);
    }

    /// Read cursor of a user; untracked users have read nothing.
    pub fn cursor(&self, user_id: i64) -> usize {
        self.cursors.get(&user_id).copied().unwrap_or(0)
    }

    /// Messages the user has not read, counted against the true total.
    pub fn unread(&self, user_id: i64) -> usize {
        self.total.saturating_sub(self.cursor(user_id))
    }

    /// Mark everything appended so far as read by the user.
    pub fn mark_read(&mut self, user_id: i64) {
        self.cursors.insert(user_id, self.total);
    }
}
