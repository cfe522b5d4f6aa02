//! TCP listener spawning one session task per connection.

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{error, info};
use tupledb_kv::Database;

use crate::config::ServerConfig;
use crate::session::Session;

/// The accept loop for PostgreSQL client connections.
pub struct PgListener {
    listener: TcpListener,
    db: Database,
    config: ServerConfig,
}

impl PgListener {
    /// Binds the configured loopback port.
    pub async fn bind(config: ServerConfig, db: Database) -> io::Result<Self> {
        let listener = TcpListener::bind(config.socket_addr()).await?;
        info!(addr = %listener.local_addr()?, "listening for PostgreSQL connections");
        Ok(Self {
            listener,
            db,
            config,
        })
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, running each session in its own
    /// task with a cloned store handle. Accept failures are fatal.
    pub async fn serve(self) -> io::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!(error = %err, "accept failed");
                    return Err(err);
                }
            };

            info!(%peer, "accepted connection");
            let session = Session::new(stream, peer, self.db.clone(), &self.config);
            tokio::spawn(session.run());
        }
    }
}
