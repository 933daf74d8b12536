//! Connection Handler Module
//!
//! This module manages individual client connections to the ledger.
//! Each client connection is handled by its own async task; the blocking
//! storage work of each request runs on Tokio's blocking pool.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (main.rs)                                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Frame line  │───>│ Execute     │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **One reply per line**: every received line, even a blank or garbled
//!   one, is answered with exactly one reply line
//! - **Pipelining**: several lines in one TCP packet are answered in order
//! - **Idle timeout**: silent clients are disconnected
//! - **Statistics**: tracks connection and request metrics
//!
//! ## Example
//!
//! ```ignore
//! use ledgerline::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use ledgerline::commands::CommandHandler;
//! use ledgerline::storage::{StorageConfig, StorageEngine};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new(StorageConfig::new("ledger.db")));
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(storage);
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats, ConnectionConfig::default()));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionConfig, ConnectionError, ConnectionHandler, ConnectionStats,
};
