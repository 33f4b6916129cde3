//! Unified error types for the log consumer.
//!
//! Database failures carry a stable code:
//! - DB_001: connection checkout failed
//! - DB_002: schema initialization failed
//! - DB_003: record write failed
//! - DB_004: query failed

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Database error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorCode {
    /// DB_001: Could not obtain a connection from the pool
    ConnectFailed,
    /// DB_002: Schema creation failed
    SchemaFailed,
    /// DB_003: Failed to write a record
    WriteFailed,
    /// DB_004: Read query failed
    QueryFailed,
}

impl DbErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectFailed => "DB_001",
            Self::SchemaFailed => "DB_002",
            Self::WriteFailed => "DB_003",
            Self::QueryFailed => "DB_004",
        }
    }
}

/// Unified error type for the log consumer.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error with code.
    #[error("[{code}] {message}")]
    Database { code: &'static str, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a database error.
    pub fn database(code: DbErrorCode, msg: impl Into<String>) -> Self {
        Self::Database {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Database { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Prefixes a database error's message with `context`. Other variants pass
    /// through unchanged.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::Database { code, message } => Self::Database {
                code,
                message: format!("{context}: {message}"),
            },
            other => other,
        }
    }

    /// Re-tags a database error with `code`, keeping its message.
    pub fn with_code(self, code: DbErrorCode) -> Self {
        match self {
            Self::Database { message, .. } => Self::Database {
                code: code.code(),
                message,
            },
            other => other,
        }
    }
}
