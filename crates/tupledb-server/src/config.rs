//! Server configuration.

use tupledb_sql::ScanLayout;

/// Configuration for the wire server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Loopback port to listen on for PostgreSQL connections. Port 0
    /// binds an ephemeral port (used by tests).
    pub pg_port: u16,
    /// Clear the entire keyspace before serving.
    pub reset: bool,
    /// Serve SELECT from the column layout instead of the row layout.
    pub columnar: bool,
}

impl ServerConfig {
    /// Creates a config listening on the given port.
    pub fn new(pg_port: u16) -> Self {
        Self {
            pg_port,
            ..Self::default()
        }
    }

    /// The loopback socket address to bind.
    pub fn socket_addr(&self) -> String {
        format!("127.0.0.1:{}", self.pg_port)
    }

    /// The SELECT scan layout this config selects.
    pub fn scan_layout(&self) -> ScanLayout {
        if self.columnar {
            ScanLayout::Column
        } else {
            ScanLayout::Row
        }
    }
}
