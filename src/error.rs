//! Error types for tablechat.

use thiserror::Error;

/// Whether an error should abort the process or only the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Startup or data-integrity failure. The process cannot continue.
    Fatal,
    /// Scoped to a single request. Log it, notify the requester, move on.
    Recoverable,
}

/// Common error type for tablechat.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Database query error.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection or migration error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A connected session could not be reached.
    #[error("emit error: {0}")]
    Emit(String),
}

impl ChatError {
    /// Classify the error as fatal or recoverable.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::DatabaseConnection(_) | ChatError::Io(_) | ChatError::Config(_) => {
                ErrorKind::Fatal
            }
            ChatError::Database(_)
            | ChatError::Validation(_)
            | ChatError::NotFound(_)
            | ChatError::Emit(_) => ErrorKind::Recoverable,
        }
    }

    /// Returns true if the error should abort the process.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        ChatError::Database(e.to_string())
    }
}

/// Result type alias for tablechat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
