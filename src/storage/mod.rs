//! Storage Engine Module
//!
//! This module provides the persistence layer for the ledger: a
//! [`LedgerStore`] trait with one operation per action, and the SQLite
//! [`StorageEngine`] that implements it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │                                                             │
//! │   call ─> open connection ─> statement ─> drop connection   │
//! │                                                             │
//! │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐    │
//! │   │   schema     │   │ credentials  │   │ ledger_date()│    │
//! │   │ (startup)    │   │ (argon2)     │   │ (per conn)   │    │
//! │   └──────────────┘   └──────────────┘   └──────────────┘    │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                ▼
//!                          SQLite file
//! ```
//!
//! ## Features
//!
//! - **Connection per call**: no connection outlives the operation that
//!   opened it, on any exit path
//! - **Idempotent schema**: tables, columns and indexes are created only
//!   when missing
//! - **Hashed credentials**: passwords are stored as Argon2id hashes
//!
//! ## Example
//!
//! ```no_run
//! use ledgerline::ledger::{Entry, EntryType};
//! use ledgerline::storage::{LedgerStore, StorageConfig, StorageEngine};
//! use rust_decimal::Decimal;
//!
//! let engine = StorageEngine::new(StorageConfig::new("ledger.db"));
//! engine.initialize().unwrap();
//!
//! let entry = Entry::new("alice", Decimal::new(1250, 2), EntryType::Expense, "2023-10-27", "Lunch", "");
//! let id = engine.add(&entry).unwrap();
//! assert_eq!(engine.list("alice").unwrap()[0].id, Some(id));
//! ```

pub mod credentials;
pub mod engine;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use engine::{StorageConfig, StorageEngine, StorageStats};
pub use store::{LedgerStore, StorageError, StorageResult};
