//! TupleDB server daemon.
//!
//! `tupledbd` binds a loopback port, speaks the PostgreSQL v3
//! simple-query protocol, and persists everything through the key/value
//! store.
//!
//! # Usage
//!
//! ```bash
//! # Serve on port 6000
//! tupledbd --pg-port 6000
//!
//! # Wipe the keyspace on startup
//! tupledbd --pg-port 6000 --reset
//!
//! # Serve SELECT from the column layout
//! tupledbd --pg-port 6000 --columnar
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tupledb_kv::Database;
use tupledb_server::{PgListener, ServerConfig};

/// TupleDB server daemon.
#[derive(Parser, Debug)]
#[command(name = "tupledbd", version, about = "TupleDB database server")]
struct Args {
    /// Port to listen on for PostgreSQL connections (loopback only)
    #[arg(long = "pg-port", env = "TUPLEDB_PG_PORT")]
    pg_port: u16,

    /// Clear the entire keyspace before serving
    #[arg(long)]
    reset: bool,

    /// Serve SELECT from the column layout instead of the row layout
    #[arg(long)]
    columnar: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "TUPLEDB_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let config = ServerConfig {
        pg_port: args.pg_port,
        reset: args.reset,
        columnar: args.columnar,
    };

    info!(
        pg_port = config.pg_port,
        reset = config.reset,
        columnar = config.columnar,
        "starting tupledbd"
    );

    let db = Database::new();
    if config.reset {
        let _: Result<(), std::convert::Infallible> = db.transact(|tx| {
            tx.clear_all();
            Ok(())
        });
        info!("keyspace cleared");
    }

    let listener = PgListener::bind(config, db)
        .await
        .context("failed to bind PostgreSQL port")?;

    tokio::select! {
        result = listener.serve() => {
            result.context("listener failed")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    info!("server stopped");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(format!(
        "tupledb_server={level},tupledb_sql={level},tupledb_kv={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
