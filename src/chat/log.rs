//! Durable chat log storage for tablechat.
//!
//! Lobby and table messages are written to the `chat_log` table so that a
//! participant connecting later can catch up.

use chrono::{DateTime, SecondsFormat, Utc};

use super::message::ChatMessage;
use super::rewrite::TokenRewriter;
use super::ChatOrigin;
use crate::db::DbPool;
use crate::Result;

/// Name stored for server notices.
pub const SERVER_NAME: &str = "__server";

/// Who wrote a stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAuthor {
    /// A server notice.
    Server,
    /// A connected participant.
    Participant(String),
    /// An identity on the external platform.
    External(String),
}

impl ChatAuthor {
    /// Derive the author of a delivered message.
    pub fn of(message: &ChatMessage) -> Self {
        match message.origin {
            ChatOrigin::Server => ChatAuthor::Server,
            ChatOrigin::Participant => ChatAuthor::Participant(message.who.clone()),
            ChatOrigin::External => ChatAuthor::External(message.who.clone()),
        }
    }

    fn name_column(&self) -> &str {
        match self {
            ChatAuthor::Server => SERVER_NAME,
            ChatAuthor::Participant(name) | ChatAuthor::External(name) => name,
        }
    }

    fn external_name_column(&self) -> Option<&str> {
        match self {
            ChatAuthor::External(name) => Some(name),
            _ => None,
        }
    }
}

/// A stored chat log entry.
#[derive(Debug, Clone)]
pub struct ChatLog {
    /// Log entry ID.
    pub id: i64,
    /// Room the message was sent to.
    pub room: String,
    /// Author of the message.
    pub author: ChatAuthor,
    /// Raw message body, before token rewriting.
    pub message: String,
    /// When the message was sent.
    pub datetime: DateTime<Utc>,
}

impl ChatLog {
    /// Convert the entry into a displayable message.
    ///
    /// `server_name` is the name server notices are shown under.
    pub fn into_message(self, rewriter: &TokenRewriter, server_name: &str) -> ChatMessage {
        let msg = rewriter.rewrite(&self.message);
        let message = match self.author {
            ChatAuthor::Server => ChatMessage::server(server_name, msg, self.room),
            ChatAuthor::Participant(name) => ChatMessage::participant(name, msg, self.room),
            ChatAuthor::External(name) => ChatMessage::external(name, msg, self.room),
        };
        message.at(self.datetime)
    }
}

/// Database row type for ChatLog.
#[derive(sqlx::FromRow)]
struct ChatLogRow {
    id: i64,
    name: String,
    external_name: Option<String>,
    message: String,
    room: String,
    datetime_sent: String,
}

impl From<ChatLogRow> for ChatLog {
    fn from(row: ChatLogRow) -> Self {
        // An external name always wins over the sentinel.
        let author = match row.external_name {
            Some(external) => ChatAuthor::External(external),
            None if row.name == SERVER_NAME => ChatAuthor::Server,
            None => ChatAuthor::Participant(row.name),
        };

        let datetime = DateTime::parse_from_rfc3339(&row.datetime_sent)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Self {
            id: row.id,
            room: row.room,
            author,
            message: row.message,
            datetime,
        }
    }
}

/// New chat log entry for insertion.
#[derive(Debug, Clone)]
pub struct NewChatLog {
    pub room: String,
    pub author: ChatAuthor,
    pub message: String,
    pub datetime: DateTime<Utc>,
}

impl NewChatLog {
    /// Create a new entry stamped with the current time.
    pub fn new(room: impl Into<String>, author: ChatAuthor, message: impl Into<String>) -> Self {
        Self {
            room: room.into(),
            author,
            message: message.into(),
            datetime: Utc::now(),
        }
    }

    /// Override the timestamp.
    pub fn at(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = datetime;
        self
    }
}

impl From<&ChatMessage> for NewChatLog {
    fn from(message: &ChatMessage) -> Self {
        Self::new(&message.room, ChatAuthor::of(message), &message.msg).at(message.datetime)
    }
}

/// Repository for chat log operations.
pub struct ChatLogRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ChatLogRepository<'a> {
    /// Create a new ChatLogRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Save a chat log entry.
    pub async fn save(&self, log: &NewChatLog) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO chat_log (name, external_name, message, room, datetime_sent)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(log.author.name_column())
        .bind(log.author.external_name_column())
        .bind(&log.message)
        .bind(&log.room)
        .bind(log.datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Get the most recent entries for a room, newest first.
    pub async fn get_recent(&self, room: &str, limit: usize) -> Result<Vec<ChatLog>> {
        let rows = sqlx::query_as::<_, ChatLogRow>(
            r#"
            SELECT id, name, external_name, message, room, datetime_sent
            FROM chat_log
            WHERE room = $1
            ORDER BY datetime_sent DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(room)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatLog::from).collect())
    }

    /// Count entries for a room.
    pub async fn count(&self, room: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_log WHERE room = $1")
            .bind(room)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }

    /// Delete a single entry. Returns false if it did not exist.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chat_log WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all entries for a room.
    pub async fn delete_room(&self, room: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chat_log WHERE room = $1")
            .bind(room)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get_recent() {
        let db = setup_db().await;
        let repo = ChatLogRepository::new(db.pool());

        for i in 1..=5 {
            let log = NewChatLog::new(
                "lobby",
                ChatAuthor::Participant("alice".to_string()),
                format!("Message {i}"),
            )
            .at(at(i));
            repo.save(&log).await.unwrap();
        }

        let logs = repo.get_recent("lobby", 3).await.unwrap();
        assert_eq!(logs.len(), 3);
        // Newest first
        assert_eq!(logs[0].message, "Message 5");
        assert_eq!(logs[1].message, "Message 4");
        assert_eq!(logs[2].message, "Message 3");
        assert_eq!(logs[0].datetime, at(5));
    }

    #[tokio::test]
    async fn test_get_recent_unbounded_limit() {
        let db = setup_db().await;
        let repo = ChatLogRepository::new(db.pool());
        for i in 1..=3 {
            let log = NewChatLog::new("lobby", ChatAuthor::Server, format!("Notice {i}")).at(at(i));
            repo.save(&log).await.unwrap();
        }

        let logs = repo.get_recent("lobby", usize::MAX).await.unwrap();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].message, "Notice 3");
    }

    #[tokio::test]
    async fn test_delete_single_entry() {
        let db = setup_db().await;
        let repo = ChatLogRepository::new(db.pool());
        let keep = NewChatLog::new("table1", ChatAuthor::Server, "kept").at(at(1));
        let stray = NewChatLog::new("table1", ChatAuthor::Server, "stray").at(at(2));
        repo.save(&keep).await.unwrap();
        let id = repo.save(&stray).await.unwrap();

        assert!(repo.delete(id).await.unwrap());
        assert!(!repo.delete(id).await.unwrap());

        let logs = repo.get_recent("table1", 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "kept");
    }

    #[tokio::test]
    async fn test_get_recent_empty() {
        let db = setup_db().await;
        let repo = ChatLogRepository::new(db.pool());
        assert!(repo.get_recent("lobby", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_authors_round_trip() {
        let db = setup_db().await;
        let repo = ChatLogRepository::new(db.pool());

        let authors = [
            ChatAuthor::Participant("alice".to_string()),
            ChatAuthor::Server,
            ChatAuthor::External("carol#1234".to_string()),
        ];
        for (i, author) in authors.iter().enumerate() {
            repo.save(&NewChatLog::new("lobby", author.clone(), "x").at(at(i as i64)))
                .await
                .unwrap();
        }

        let logs = repo.get_recent("lobby", 10).await.unwrap();
        let stored: Vec<ChatAuthor> = logs.into_iter().rev().map(|l| l.author).collect();
        assert_eq!(stored, authors);
    }

    #[tokio::test]
    async fn test_external_name_supersedes_server_sentinel() {
        let db = setup_db().await;
        sqlx::query(
            "INSERT INTO chat_log (name, external_name, message, room, datetime_sent)
             VALUES ('__server', 'dave', 'relayed', 'lobby', '2024-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let repo = ChatLogRepository::new(db.pool());
        let logs = repo.get_recent("lobby", 1).await.unwrap();
        assert_eq!(logs[0].author, ChatAuthor::External("dave".to_string()));
    }

    #[tokio::test]
    async fn test_rooms_are_separate() {
        let db = setup_db().await;
        let repo = ChatLogRepository::new(db.pool());

        repo.save(&NewChatLog::new("lobby", ChatAuthor::Server, "Lobby msg"))
            .await
            .unwrap();
        repo.save(&NewChatLog::new("table1", ChatAuthor::Server, "Table msg"))
            .await
            .unwrap();

        assert_eq!(repo.count("lobby").await.unwrap(), 1);
        assert_eq!(repo.count("table1").await.unwrap(), 1);

        let deleted = repo.delete_room("lobby").await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.count("lobby").await.unwrap(), 0);
        assert_eq!(repo.count("table1").await.unwrap(), 1);
    }

    #[test]
    fn test_into_message() {
        let log = ChatLog {
            id: 1,
            room: "lobby".to_string(),
            author: ChatAuthor::Server,
            message: "Game starting".to_string(),
            datetime: at(2),
        };

        let msg = log.into_message(&TokenRewriter::disabled(), "tablechat");
        assert!(msg.is_server());
        assert_eq!(msg.who, "tablechat");
        assert_eq!(msg.msg, "Game starting");
        assert_eq!(msg.datetime, at(2));
        assert!(msg.recipient.is_none());
    }

    #[test]
    fn test_new_chat_log_from_message() {
        let msg = ChatMessage::external("carol", "hey", "lobby");
        let log = NewChatLog::from(&msg);
        assert_eq!(log.author, ChatAuthor::External("carol".to_string()));
        assert_eq!(log.room, "lobby");
        assert_eq!(log.datetime, msg.datetime);
    }
}
