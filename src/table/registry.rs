//! Registry of live tables.
//!
//! The registry lock guards only the map itself. Enumeration copies the
//! `Arc<Table>` references out and releases it before any table lock is
//! taken, and tables are then locked one at a time. Holding the registry lock
//! while waiting on a table, or two table locks at once, could deadlock
//! against a task that locks in the opposite order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::room::{parse_room, Table, TableState};
use crate::chat::CHAT_LIMIT;

/// Shared collection of live tables.
pub struct TableRegistry {
    tables: RwLock<HashMap<u64, Arc<Table>>>,
    next_id: AtomicU64,
    chat_cap: usize,
}

impl TableRegistry {
    /// Create an empty registry whose tables keep `chat_cap` chat messages.
    pub fn new(chat_cap: usize) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            chat_cap,
        }
    }

    /// Create a table with the next free ID and register it.
    pub async fn create_table(&self, name: impl Into<String>) -> Arc<Table> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let table = Arc::new(Table::new(id, name, self.chat_cap));
        self.tables.write().await.insert(id, Arc::clone(&table));
        debug!(table_id = id, "table registered");
        table
    }

    /// Register an existing table.
    ///
    /// Returns false if a table with the same ID is already registered.
    pub async fn insert(&self, table: Arc<Table>) -> bool {
        let mut tables = self.tables.write().await;
        if tables.contains_key(&table.id()) {
            return false;
        }
        self.next_id.fetch_max(table.id() + 1, Ordering::Relaxed);
        tables.insert(table.id(), table);
        true
    }

    /// Get a table by ID.
    pub async fn get(&self, id: u64) -> Option<Arc<Table>> {
        self.tables.read().await.get(&id).cloned()
    }

    /// Get the table behind a chat room ID such as `table12`.
    pub async fn table_for_room(&self, room: &str) -> Option<Arc<Table>> {
        self.get(parse_room(room)?).await
    }

    /// Remove a table and mark it closed.
    ///
    /// Tasks still holding a snapshot see the closed flag and skip it.
    pub async fn remove(&self, id: u64) -> Option<Arc<Table>> {
        let table = self.tables.write().await.remove(&id)?;
        table.lock().await.close();
        debug!(table_id = id, "table removed");
        Some(table)
    }

    /// Number of registered tables.
    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }

    /// Copy out references to every registered table, ordered by ID.
    pub async fn snapshot(&self) -> Vec<Arc<Table>> {
        let mut tables: Vec<Arc<Table>> = self.tables.read().await.values().cloned().collect();
        tables.sort_by_key(|t| t.id());
        tables
    }

    /// Take a snapshot, then lock each table in turn and apply `f`.
    ///
    /// Tables closed after the snapshot was taken are skipped.
    pub async fn inspect_each<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&Table, &TableState) -> T,
    {
        let snapshot = self.snapshot().await;
        let mut results = Vec::with_capacity(snapshot.len());
        for table in &snapshot {
            let state = table.lock().await;
            if state.is_closed() {
                debug!(table_id = table.id(), "skipping closed table");
                continue;
            }
            results.push(f(table, &state));
        }
        results
    }
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new(CHAT_LIMIT)
    }
}
