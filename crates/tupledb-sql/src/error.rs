//! Error types for parsing and execution.

use thiserror::Error;
use tupledb_kv::KvError;

/// Errors raised while turning SQL text into the executable subset.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The underlying parser rejected the SQL text.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Valid SQL outside the supported subset.
    #[error("unsupported SQL: {0}")]
    Unsupported(String),

    /// The query text contained no statement.
    #[error("empty query")]
    EmptyQuery,

    /// More than one statement in a single query message.
    #[error("expected a single statement, got {0}")]
    MultipleStatements(usize),
}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        ParseError::Syntax(err.to_string())
    }
}

/// Errors raised while executing a statement against the store.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation targets a table with no catalog entry.
    #[error("table not found: {0}")]
    TableUnknown(String),

    /// SELECT target is not a column of the resolved table.
    #[error("column not found: {0}")]
    ColumnUnknown(String),

    /// INSERT constant the engine cannot store.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// A stored key failed to decode back into a cell.
    #[error("corrupt key in table {table}: {source}")]
    Corrupt {
        table: String,
        #[source]
        source: KvError,
    },
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
