//! Database schema and migrations for tablechat.
//!
//! Migrations are applied in order the first time a database is opened and
//! whenever new entries are appended here.

/// Database migrations.
///
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: chat log
    r#"
-- Durable chat history for the lobby and every table
CREATE TABLE chat_log (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,       -- author, or '__server' for notices
    external_name   TEXT,                -- set when bridged from the external platform
    message         TEXT NOT NULL,
    room            TEXT NOT NULL,
    datetime_sent   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX idx_chat_log_room ON chat_log(room, id);
"#,
];
