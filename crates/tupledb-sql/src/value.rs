//! Cell values and their encodings.

use crate::ast::Literal;
use crate::error::{EngineError, EngineResult};

/// Type token for integer columns (`INT` and friends).
pub const INT4_TOKEN: &str = "pg_catalog.int4";
/// Type token for text columns.
pub const TEXT_TOKEN: &str = "text";

/// A single cell value.
///
/// Two encodings exist: the storage encoding written into the KV store
/// (text as raw UTF-8 bytes, integers as their JSON decimal text) and the
/// wire encoding sent inside `DataRow` frames (JSON: integers stay bare,
/// strings are quoted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// Textual value.
    Text(String),
    /// Signed integer value.
    Int(i64),
}

impl CellValue {
    /// Converts an INSERT literal, rejecting constant kinds the store
    /// does not handle.
    pub fn from_literal(literal: &Literal) -> EngineResult<Self> {
        match literal {
            Literal::Integer(n) => Ok(CellValue::Int(*n)),
            Literal::Text(s) => Ok(CellValue::Text(s.clone())),
            Literal::Float(repr) => Err(EngineError::UnsupportedValue(format!(
                "non-integer numeric constant {}",
                repr
            ))),
            Literal::Null => Err(EngineError::UnsupportedValue("NULL".to_string())),
        }
    }

    /// Encodes the value for storage.
    pub fn storage_bytes(&self) -> Vec<u8> {
        match self {
            CellValue::Text(s) => s.clone().into_bytes(),
            CellValue::Int(n) => serde_json::Value::from(*n).to_string().into_bytes(),
        }
    }

    /// Decodes stored bytes, using the column's type token to pick the
    /// variant. Undecodable integers fall back to text so a scan never
    /// fails on a single cell.
    pub fn from_storage(type_token: &str, bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes).into_owned();
        if type_token == INT4_TOKEN {
            if let Ok(n) = text.parse::<i64>() {
                return CellValue::Int(n);
            }
        }
        CellValue::Text(text)
    }

    /// Encodes the value for a `DataRow` frame as JSON text.
    pub fn wire_json(&self) -> Vec<u8> {
        let json = match self {
            CellValue::Text(s) => serde_json::Value::from(s.as_str()),
            CellValue::Int(n) => serde_json::Value::from(*n),
        };
        json.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_literal() {
        assert_eq!(
            CellValue::from_literal(&Literal::Integer(14)).unwrap(),
            CellValue::Int(14)
        );
        assert_eq!(
            CellValue::from_literal(&Literal::Text("garry".to_string())).unwrap(),
            CellValue::Text("garry".to_string())
        );
    }

    #[test]
    fn test_from_literal_rejects_float_and_null() {
        assert!(matches!(
            CellValue::from_literal(&Literal::Float("1.5".to_string())),
            Err(EngineError::UnsupportedValue(_))
        ));
        assert!(matches!(
            CellValue::from_literal(&Literal::Null),
            Err(EngineError::UnsupportedValue(_))
        ));
    }

    #[test]
    fn test_storage_roundtrip() {
        let int = CellValue::Int(-42);
        assert_eq!(int.storage_bytes(), b"-42");
        assert_eq!(CellValue::from_storage(INT4_TOKEN, b"-42"), int);

        let text = CellValue::Text("garry".to_string());
        assert_eq!(text.storage_bytes(), b"garry");
        assert_eq!(CellValue::from_storage(TEXT_TOKEN, b"garry"), text);
    }

    #[test]
    fn test_undecodable_int_falls_back_to_text() {
        assert_eq!(
            CellValue::from_storage(INT4_TOKEN, b"oops"),
            CellValue::Text("oops".to_string())
        );
    }

    #[test]
    fn test_wire_json() {
        assert_eq!(CellValue::Int(14).wire_json(), b"14");
        assert_eq!(
            CellValue::Text("garry".to_string()).wire_json(),
            b"\"garry\""
        );
        // JSON escaping applies to the wire form, not storage.
        assert_eq!(
            CellValue::Text("a\"b".to_string()).wire_json(),
            b"\"a\\\"b\""
        );
    }
}
