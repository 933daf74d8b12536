//! Command Handler Module
//!
//! This module implements the request dispatch layer for the ledger.
//! It receives raw request lines, parses and validates them, executes them
//! against the storage engine, and returns structured replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  LedgerStore    │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Actions
//!
//! - `add`, `list`, `search`, `delete`, `clear`
//! - `register`, `login`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
