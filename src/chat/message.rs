//! Chat message types and the events delivered to clients.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Where a chat message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatOrigin {
    /// Typed by a connected participant.
    Participant,
    /// Generated by the server (notices, command feedback).
    Server,
    /// Relayed from the external messaging platform.
    External,
}

/// A chat message as delivered to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message body, already rewritten for display.
    pub msg: String,
    /// Display name of the origin.
    pub who: String,
    /// Origin classification.
    pub origin: ChatOrigin,
    /// When the message was sent.
    pub datetime: DateTime<Utc>,
    /// Room the message belongs to.
    pub room: String,
    /// Username of the private recipient. None means the whole room.
    pub recipient: Option<String>,
}

impl ChatMessage {
    fn with_origin(
        origin: ChatOrigin,
        who: impl Into<String>,
        msg: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self {
            msg: msg.into(),
            who: who.into(),
            origin,
            datetime: Utc::now(),
            room: room.into(),
            recipient: None,
        }
    }

    /// Create a message typed by a participant.
    pub fn participant(
        who: impl Into<String>,
        msg: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self::with_origin(ChatOrigin::Participant, who, msg, room)
    }

    /// Create a server notice. `who` is the name notices are displayed under.
    pub fn server(who: impl Into<String>, msg: impl Into<String>, room: impl Into<String>) -> Self {
        Self::with_origin(ChatOrigin::Server, who, msg, room)
    }

    /// Create a message relayed from the external platform.
    pub fn external(
        who: impl Into<String>,
        msg: impl Into<String>,
        room: impl Into<String>,
    ) -> Self {
        Self::with_origin(ChatOrigin::External, who, msg, room)
    }

    /// Address the message to a single user.
    pub fn to_recipient(mut self, username: impl Into<String>) -> Self {
        self.recipient = Some(username.into());
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = datetime;
        self
    }

    pub fn is_server(&self) -> bool {
        self.origin == ChatOrigin::Server
    }

    pub fn is_external(&self) -> bool {
        self.origin == ChatOrigin::External
    }

    pub fn is_private(&self) -> bool {
        self.recipient.is_some()
    }
}

/// Wire shape of a chat message. Clients expect two flags, not an enum.
#[derive(Serialize)]
struct ChatMessageWire<'a> {
    msg: &'a str,
    who: &'a str,
    discord: bool,
    server: bool,
    datetime: &'a DateTime<Utc>,
    room: &'a str,
    recipient: &'a str,
}

impl Serialize for ChatMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ChatMessageWire {
            msg: &self.msg,
            who: &self.who,
            discord: self.is_external(),
            server: self.is_server(),
            datetime: &self.datetime,
            room: &self.room,
            recipient: self.recipient.as_deref().unwrap_or(""),
        }
        .serialize(serializer)
    }
}

/// A backlog of chat messages sent when a participant (re)joins a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatListMessage {
    /// Messages, oldest first.
    pub list: Vec<ChatMessage>,
    /// Number of messages the participant has not read yet.
    pub unread: usize,
}

/// Events emitted to a connected session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A single chat message.
    Chat(ChatMessage),
    /// A chat backlog.
    ChatList(ChatListMessage),
    /// Feedback about something the participant did wrong.
    Warning { warning: String },
    /// A generic failure notice.
    Error { error: String },
}

impl ServerEvent {
    /// Command name the client dispatches on.
    pub fn command(&self) -> &'static str {
        match self {
            ServerEvent::Chat(_) => "chat",
            ServerEvent::ChatList(_) => "chatList",
            ServerEvent::Warning { .. } => "warning",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Encode the event as the JSON frame a transport sends to the client.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::ChatError::Emit(format!("failed to encode {}: {e}", self.command())))
    }

    /// Generic error notice that does not leak internals.
    pub fn generic_error() -> Self {
        ServerEvent::Error {
            error: super::DEFAULT_ERROR_MSG.to_string(),
        }
    }
}
