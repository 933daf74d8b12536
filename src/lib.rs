//! # Ledgerline - A Personal Finance Ledger Server
//!
//! Ledgerline keeps per-user income and expense records in a SQLite file
//! and serves them over a line-oriented TCP protocol. Each request is one
//! comma-delimited line; each reply is one `~`-delimited line.
//!
//! ## Features
//!
//! - **Plain-text protocol**: `username,action[,args...]` in, `action~success~message~entries` out
//! - **Exact amounts**: amounts are decimals, never floats
//! - **Hashed credentials**: passwords are stored as Argon2 hashes
//! - **Async I/O**: built on Tokio, storage work runs on the blocking pool
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             Ledgerline                                  │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                      ┌─────────────┐          ▼                         │
//! │                      │   Line      │   ┌──────────────────────────┐     │
//! │                      │   Parser    │   │      StorageEngine       │     │
//! │                      └─────────────┘   │  (connection per call)   │     │
//! │                                        └────────────┬─────────────┘     │
//! │                                                     ▼                   │
//! │                                               SQLite file               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ledgerline::commands::CommandHandler;
//! use ledgerline::connection::{handle_connection, ConnectionConfig, ConnectionStats};
//! use ledgerline::storage::{StorageConfig, StorageEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = StorageEngine::new(StorageConfig::new("ledger.db"));
//!     storage.initialize()?;
//!
//!     let handler = CommandHandler::new(Arc::new(storage));
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await?;
//!         let handler = handler.clone();
//!         let stats = Arc::clone(&stats);
//!         tokio::spawn(handle_connection(stream, addr, handler, stats, ConnectionConfig::default()));
//!     }
//! }
//! ```
//!
//! ## Supported Actions
//!
//! - `add,amount,date[,type,subject,note]` or `add,amount,date[,subject,note]`
//! - `register,password` / `login,password`
//! - `search[,start,end,type,min,max]`
//! - `list` / `clear`
//! - `delete,id`
//!
//! ## Module Overview
//!
//! - [`ledger`]: entries, entry types, amounts and search criteria
//! - [`protocol`]: request parser and reply encoder
//! - [`storage`]: SQLite storage engine
//! - [`commands`]: request dispatch
//! - [`connection`]: client connection management
//! - [`config`]: command-line and environment configuration

pub mod commands;
pub mod config;
pub mod connection;
pub mod ledger;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::{Cli, Config};
pub use connection::{handle_connection, ConnectionConfig, ConnectionStats};
pub use ledger::{Entry, EntryType, SearchCriteria};
pub use protocol::{parse_request, ParseError, Reply, Request};
pub use storage::{LedgerStore, StorageConfig, StorageEngine};

/// The default port the ledger listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host the ledger binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of Ledgerline
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
