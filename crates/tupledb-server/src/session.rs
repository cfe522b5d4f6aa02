//! Per-connection session loop.
//!
//! A session drives one connection through the protocol state machine:
//! startup (answering SSL requests with a denial byte), then one simple
//! `Query` at a time until `Terminate` or EOF. Every query response ends
//! with `ReadyForQuery`. An execution error is logged, reported to the
//! client as an `ErrorResponse`, and closes the connection.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use tupledb_kv::Database;
use tupledb_sql::{Engine, Parser, QueryResult, StatementOutcome};

use crate::config::ServerConfig;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{self, FieldDescription, FrontendMessage, StartupMessage};

/// One client session.
pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    engine: Engine,
}

impl Session {
    /// Creates a session over an accepted connection.
    pub fn new(stream: TcpStream, peer: SocketAddr, db: Database, config: &ServerConfig) -> Self {
        Self {
            stream,
            peer,
            engine: Engine::new(db, config.scan_layout()),
        }
    }

    /// Runs the session to completion, consuming it.
    ///
    /// Errors never propagate out of a session task: they are logged and,
    /// when the connection is still writable, reported to the client.
    pub async fn run(mut self) {
        match self.serve().await {
            Ok(()) => debug!(peer = %self.peer, "session closed"),
            Err(SessionError::Io(err)) => {
                warn!(peer = %self.peer, error = %err, "session i/o failed");
            }
            Err(err) => {
                warn!(peer = %self.peer, error = %err, "session terminated");
                let mut buf = BytesMut::new();
                protocol::error_response(&mut buf, &err.to_string());
                let _ = self.stream.write_all(&buf).await;
            }
        }
    }

    async fn serve(&mut self) -> SessionResult<()> {
        self.handle_startup().await?;

        loop {
            match protocol::read_message(&mut self.stream).await? {
                Some(FrontendMessage::Query(sql)) => self.handle_query(&sql).await?,
                Some(FrontendMessage::Terminate) | None => return Ok(()),
            }
        }
    }

    /// Handles the startup phase: denies SSL requests with a single `N`
    /// byte, then answers the real startup message with
    /// `AuthenticationOk` and `ReadyForQuery`.
    async fn handle_startup(&mut self) -> SessionResult<()> {
        loop {
            match protocol::read_startup(&mut self.stream).await? {
                StartupMessage::SslRequest => {
                    self.stream.write_all(&[protocol::SSL_DENIED]).await?;
                }
                StartupMessage::Startup(params) => {
                    info!(
                        peer = %self.peer,
                        user = params.get("user").map(String::as_str).unwrap_or(""),
                        database = params.get("database").map(String::as_str).unwrap_or(""),
                        "connection established"
                    );

                    let mut buf = BytesMut::new();
                    protocol::authentication_ok(&mut buf);
                    protocol::ready_for_query(&mut buf);
                    self.stream.write_all(&buf).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Executes one `Query` message and writes the complete response.
    async fn handle_query(&mut self, sql: &str) -> SessionResult<()> {
        debug!(peer = %self.peer, sql, "executing query");

        let statement = Parser::parse_one(sql)?;
        let outcome = self.engine.execute(&statement)?;

        let mut buf = BytesMut::new();
        match outcome {
            StatementOutcome::Rows(result) => encode_result(&mut buf, &result),
            StatementOutcome::Created
            | StatementOutcome::Inserted(_)
            | StatementOutcome::Deleted => {
                protocol::command_complete(&mut buf, &command_tag(sql));
            }
        }
        protocol::ready_for_query(&mut buf);

        self.stream.write_all(&buf).await?;
        Ok(())
    }
}

/// Encodes a SELECT result: one `RowDescription`, one `DataRow` per row
/// (cells as JSON text, absent cells as SQL NULL), and a `SELECT n`
/// completion tag.
fn encode_result(buf: &mut BytesMut, result: &QueryResult) {
    let fields: Vec<FieldDescription> = result
        .field_names
        .iter()
        .zip(&result.field_types)
        .map(|(name, type_token)| FieldDescription {
            name: name.clone(),
            type_oid: protocol::type_oid(type_token),
        })
        .collect();
    protocol::row_description(buf, &fields);

    for row in &result.rows {
        let cells: Vec<Option<Vec<u8>>> = row
            .iter()
            .map(|cell| cell.as_ref().map(|c| c.wire_json()))
            .collect();
        protocol::data_row(buf, &cells);
    }

    protocol::command_complete(buf, &format!("SELECT {}", result.row_count()));
}

/// Builds the completion tag for non-SELECT statements: the first token
/// of the SQL, uppercased, plus ` ok`.
fn command_tag(sql: &str) -> String {
    let first = sql.split_whitespace().next().unwrap_or("");
    format!("{} ok", first.to_uppercase())
}
