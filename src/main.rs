//! Ledgerline - A Personal Finance Ledger Server
//!
//! This is the main entry point for the ledger server.
//! It sets up the TCP listener, storage engine, and handles incoming connections.

use anyhow::Context;
use clap::Parser;
use ledgerline::commands::CommandHandler;
use ledgerline::config::{Cli, Config};
use ledgerline::connection::{handle_connection, ConnectionConfig, ConnectionStats};
use ledgerline::storage::StorageEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
Ledgerline v{} - Personal Finance Ledger Server
──────────────────────────────────────────────────────────────
Server started on {}
Database: {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        ledgerline::VERSION,
        config.bind_address(),
        config.storage.path.display()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments and environment
    let config = Config::from(Cli::parse());

    // Set up logging; RUST_LOG takes precedence over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log filter '{}'", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Create the storage engine and make sure the schema exists
    let storage = Arc::new(StorageEngine::new(config.storage.clone()));
    storage.initialize().with_context(|| {
        format!(
            "failed to initialize database at {}",
            config.storage.path.display()
        )
    })?;
    info!(path = %config.storage.path.display(), "Storage engine initialized");

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    print_banner(&config);

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    let handler = CommandHandler::new(storage.clone());

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, handler, Arc::clone(&stats), config.connection) => {}
        _ = shutdown => {}
    }

    let storage_stats = storage.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        requests = stats.requests_processed.load(Ordering::Relaxed),
        bytes_read = stats.bytes_read.load(Ordering::Relaxed),
        bytes_written = stats.bytes_written.load(Ordering::Relaxed),
        entries_added = storage_stats.entries_added,
        entries_removed = storage_stats.entries_removed,
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    config: ConnectionConfig,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats, config).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
