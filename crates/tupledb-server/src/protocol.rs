//! PostgreSQL v3 wire protocol framing.
//!
//! Implements the subset the server speaks. Frontend messages are read
//! from the socket; backend messages are appended to a [`BytesMut`] so a
//! whole query response goes out in one write.
//!
//! Frame layout: regular messages are a one-byte tag followed by an i32
//! length that includes itself. Startup-phase messages have no tag; the
//! first i32 of the body distinguishes `SSLRequest` from a real
//! `StartupMessage`.

use std::collections::HashMap;

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{SessionError, SessionResult};
use tupledb_sql::value::{INT4_TOKEN, TEXT_TOKEN};

/// Magic request code for SSL negotiation.
pub const SSL_REQUEST_CODE: i32 = 80877103;
/// Magic request code for query cancellation (not supported).
pub const CANCEL_REQUEST_CODE: i32 = 80877102;
/// Protocol version 3.0.
pub const PROTOCOL_VERSION: i32 = 196608;

/// Single byte written to deny an SSL request.
pub const SSL_DENIED: u8 = b'N';

/// Upper bound on accepted message bodies.
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// A message received during the startup phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupMessage {
    /// Client asks to upgrade to SSL.
    SslRequest,
    /// Protocol 3.0 startup with its parameter map (user, database, ...).
    Startup(HashMap<String, String>),
}

/// A regular frontend message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    /// Simple query: one SQL string.
    Query(String),
    /// Client is closing the connection.
    Terminate,
}

/// Reads one startup-phase message.
pub async fn read_startup<R>(stream: &mut R) -> SessionResult<StartupMessage>
where
    R: AsyncRead + Unpin,
{
    let len = stream.read_i32().await? as usize;
    if !(8..=MAX_MESSAGE_LEN).contains(&len) {
        return Err(SessionError::Protocol(format!(
            "invalid startup message length {}",
            len
        )));
    }

    let mut body = vec![0u8; len - 4];
    stream.read_exact(&mut body).await?;
    let mut body = &body[..];
    let code = body.get_i32();

    match code {
        SSL_REQUEST_CODE => Ok(StartupMessage::SslRequest),
        PROTOCOL_VERSION => Ok(StartupMessage::Startup(read_parameters(body)?)),
        CANCEL_REQUEST_CODE => Err(SessionError::Protocol(
            "cancel requests are not supported".to_string(),
        )),
        other => Err(SessionError::Protocol(format!(
            "unknown startup code {}",
            other
        ))),
    }
}

/// Reads one regular frontend message. Returns `None` on a clean EOF
/// before the tag byte.
pub async fn read_message<R>(stream: &mut R) -> SessionResult<Option<FrontendMessage>>
where
    R: AsyncRead + Unpin,
{
    let mut tag = [0u8; 1];
    match stream.read_exact(&mut tag).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = stream.read_i32().await? as usize;
    if !(4..=MAX_MESSAGE_LEN).contains(&len) {
        return Err(SessionError::Protocol(format!(
            "invalid message length {}",
            len
        )));
    }
    let mut body = vec![0u8; len - 4];
    stream.read_exact(&mut body).await?;

    match tag[0] {
        b'Q' => Ok(Some(FrontendMessage::Query(read_cstring(&mut &body[..])?))),
        b'X' => Ok(Some(FrontendMessage::Terminate)),
        other => Err(SessionError::Protocol(format!(
            "unexpected message type '{}'",
            other as char
        ))),
    }
}

fn read_parameters(mut body: &[u8]) -> SessionResult<HashMap<String, String>> {
    let mut params = HashMap::new();
    // Parameter list: name/value cstring pairs, ended by an empty name.
    while body.remaining() > 1 {
        let name = read_cstring(&mut body)?;
        if name.is_empty() {
            break;
        }
        let value = read_cstring(&mut body)?;
        params.insert(name, value);
    }
    Ok(params)
}

fn read_cstring(body: &mut &[u8]) -> SessionResult<String> {
    let end = body
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| SessionError::Protocol("unterminated string".to_string()))?;
    let s = String::from_utf8_lossy(&body[..end]).into_owned();
    body.advance(end + 1);
    Ok(s)
}

/// One field of a `RowDescription` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    /// Field name.
    pub name: String,
    /// PostgreSQL type OID.
    pub type_oid: i32,
}

/// Maps a column type token to its PostgreSQL type OID. Unknown tokens
/// map to 0.
pub fn type_oid(token: &str) -> i32 {
    match token {
        TEXT_TOKEN => 25,
        INT4_TOKEN => 23,
        _ => 0,
    }
}

/// Appends an `AuthenticationOk` frame.
pub fn authentication_ok(buf: &mut BytesMut) {
    buf.put_u8(b'R');
    buf.put_i32(8);
    buf.put_i32(0);
}

/// Appends a `ReadyForQuery` frame with transaction status idle.
pub fn ready_for_query(buf: &mut BytesMut) {
    buf.put_u8(b'Z');
    buf.put_i32(5);
    buf.put_u8(b'I');
}

/// Appends a `RowDescription` frame.
pub fn row_description(buf: &mut BytesMut, fields: &[FieldDescription]) {
    let body_len: usize = 4
        + 2
        + fields
            .iter()
            .map(|f| f.name.len() + 1 + 4 + 2 + 4 + 2 + 4 + 2)
            .sum::<usize>();

    buf.put_u8(b'T');
    buf.put_i32(body_len as i32);
    buf.put_i16(fields.len() as i16);
    for field in fields {
        put_cstring(buf, &field.name);
        buf.put_i32(0); // table oid
        buf.put_i16(0); // attribute number
        buf.put_i32(field.type_oid);
        buf.put_i16(-1); // type size
        buf.put_i32(-1); // type modifier
        buf.put_i16(0); // text format
    }
}

/// Appends a `DataRow` frame. A `None` cell is sent as SQL NULL
/// (length -1, no bytes).
pub fn data_row(buf: &mut BytesMut, cells: &[Option<Vec<u8>>]) {
    let body_len: usize = 4
        + 2
        + cells
            .iter()
            .map(|c| 4 + c.as_ref().map_or(0, Vec::len))
            .sum::<usize>();

    buf.put_u8(b'D');
    buf.put_i32(body_len as i32);
    buf.put_i16(cells.len() as i16);
    for cell in cells {
        match cell {
            Some(bytes) => {
                buf.put_i32(bytes.len() as i32);
                buf.put_slice(bytes);
            }
            None => buf.put_i32(-1),
        }
    }
}

/// Appends a `CommandComplete` frame.
pub fn command_complete(buf: &mut BytesMut, tag: &str) {
    buf.put_u8(b'C');
    buf.put_i32(4 + tag.len() as i32 + 1);
    put_cstring(buf, tag);
}

/// Appends an `ErrorResponse` frame with severity ERROR and a generic
/// internal-error SQLSTATE.
pub fn error_response(buf: &mut BytesMut, message: &str) {
    const SEVERITY: &str = "ERROR";
    const CODE: &str = "XX000";
    let body_len = 4
        + (1 + SEVERITY.len() + 1)
        + (1 + CODE.len() + 1)
        + (1 + message.len() + 1)
        + 1;

    buf.put_u8(b'E');
    buf.put_i32(body_len as i32);
    buf.put_u8(b'S');
    put_cstring(buf, SEVERITY);
    buf.put_u8(b'C');
    put_cstring(buf, CODE);
    buf.put_u8(b'M');
    put_cstring(buf, message);
    buf.put_u8(0);
}

fn put_cstring(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_startup_ssl_request() {
        let mut wire = BytesMut::new();
        wire.put_i32(8);
        wire.put_i32(SSL_REQUEST_CODE);

        let mut reader = &wire[..];
        let msg = read_startup(&mut reader).await.unwrap();
        assert_eq!(msg, StartupMessage::SslRequest);
    }

    #[tokio::test]
    async fn test_read_startup_with_parameters() {
        let mut body = BytesMut::new();
        body.put_i32(PROTOCOL_VERSION);
        body.put_slice(b"user\0garry\0database\0postgres\0\0");

        let mut wire = BytesMut::new();
        wire.put_i32(4 + body.len() as i32);
        wire.put_slice(&body);

        let mut reader = &wire[..];
        match read_startup(&mut reader).await.unwrap() {
            StartupMessage::Startup(params) => {
                assert_eq!(params.get("user").map(String::as_str), Some("garry"));
                assert_eq!(params.get("database").map(String::as_str), Some("postgres"));
            }
            other => panic!("expected startup, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_startup_rejects_unknown_code() {
        let mut wire = BytesMut::new();
        wire.put_i32(8);
        wire.put_i32(12345);

        let mut reader = &wire[..];
        assert!(matches!(
            read_startup(&mut reader).await,
            Err(SessionError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_read_query_message() {
        let sql = "select 1";
        let mut wire = BytesMut::new();
        wire.put_u8(b'Q');
        wire.put_i32(4 + sql.len() as i32 + 1);
        wire.put_slice(sql.as_bytes());
        wire.put_u8(0);

        let mut reader = &wire[..];
        let msg = read_message(&mut reader).await.unwrap();
        assert_eq!(msg, Some(FrontendMessage::Query(sql.to_string())));
    }

    #[tokio::test]
    async fn test_read_terminate_and_eof() {
        let mut wire = BytesMut::new();
        wire.put_u8(b'X');
        wire.put_i32(4);

        let mut reader = &wire[..];
        assert_eq!(
            read_message(&mut reader).await.unwrap(),
            Some(FrontendMessage::Terminate)
        );
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_message_rejects_unknown_tag() {
        let mut wire = BytesMut::new();
        wire.put_u8(b'P');
        wire.put_i32(4);

        let mut reader = &wire[..];
        assert!(matches!(
            read_message(&mut reader).await,
            Err(SessionError::Protocol(_))
        ));
    }

    #[test]
    fn test_type_oids() {
        assert_eq!(type_oid(TEXT_TOKEN), 25);
        assert_eq!(type_oid(INT4_TOKEN), 23);
        assert_eq!(type_oid("pg_catalog.int8"), 0);
    }

    #[test]
    fn test_row_description_frame() {
        let mut buf = BytesMut::new();
        row_description(
            &mut buf,
            &[FieldDescription {
                name: "age".to_string(),
                type_oid: 23,
            }],
        );

        assert_eq!(buf[0], b'T');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        // Tag is not part of the length; everything else is.
        assert_eq!(len, buf.len() - 1);
        let nfields = i16::from_be_bytes([buf[5], buf[6]]);
        assert_eq!(nfields, 1);
        assert_eq!(&buf[7..10], b"age");
    }

    #[test]
    fn test_data_row_frame() {
        let mut buf = BytesMut::new();
        data_row(&mut buf, &[Some(b"14".to_vec()), Some(b"\"garry\"".to_vec())]);

        assert_eq!(buf[0], b'D');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        assert_eq!(len, buf.len() - 1);
        let ncols = i16::from_be_bytes([buf[5], buf[6]]);
        assert_eq!(ncols, 2);
    }

    #[test]
    fn test_data_row_null_cell() {
        let mut buf = BytesMut::new();
        data_row(&mut buf, &[Some(b"99".to_vec()), None]);

        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        assert_eq!(len, buf.len() - 1);
        // The null cell is a bare -1 length at the end of the frame.
        assert_eq!(buf[buf.len() - 4..], [0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_command_complete_frame() {
        let mut buf = BytesMut::new();
        command_complete(&mut buf, "SELECT 2");
        assert_eq!(buf[0], b'C');
        assert_eq!(&buf[5..13], b"SELECT 2");
        assert_eq!(buf[13], 0);
    }

    #[test]
    fn test_error_response_frame() {
        let mut buf = BytesMut::new();
        error_response(&mut buf, "table not found: nosuch");
        assert_eq!(buf[0], b'E');
        let len = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        assert_eq!(len, buf.len() - 1);
        assert!(buf.windows(5).any(|w| w == b"XX000"));
    }
}
