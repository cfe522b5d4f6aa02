//! Session error type.

use thiserror::Error;
use tupledb_sql::{EngineError, ParseError};

/// Errors that terminate a client session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed framing or an unexpected message type.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// SQL text the parser rejected.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Execution failure from the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Connection read/write failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
