//! Error types for the key/value layer.

use thiserror::Error;

/// Errors raised while encoding, decoding, or scanning keys.
#[derive(Debug, Error)]
pub enum KvError {
    /// Ran out of bytes while decoding a tuple element.
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    /// Encountered a type code this layer does not understand.
    #[error("unknown tuple type code 0x{code:02x} at offset {offset}")]
    UnknownTypeCode { code: u8, offset: usize },

    /// A string element did not contain valid UTF-8.
    #[error("invalid UTF-8 in tuple string at offset {0}")]
    InvalidUtf8(usize),

    /// A string element was not null-terminated.
    #[error("missing terminator for tuple element at offset {0}")]
    MissingTerminator(usize),

    /// An integer element did not fit in an i64.
    #[error("integer overflow in tuple element at offset {0}")]
    IntegerOverflow(usize),

    /// A key did not start with the expected subspace prefix.
    #[error("key does not belong to subspace (prefix is {expected} bytes, key is {actual})")]
    PrefixMismatch { expected: usize, actual: usize },

    /// A tuple element had a different type than the caller expected.
    #[error("tuple element {index} is not a {expected}")]
    ElementType {
        index: usize,
        expected: &'static str,
    },
}

/// Result alias for key/value operations.
pub type KvResult<T> = Result<T, KvError>;
