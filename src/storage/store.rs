//! The storage seam between the dispatcher and the backing store.
//!
//! Every method performs one persistence operation. Negative outcomes that
//! a client can cause on purpose (duplicate username, wrong password,
//! missing record) come back as `Ok(false)` or an empty result; `Err` is
//! reserved for faults in the store itself.

use crate::ledger::{Entry, SearchCriteria};
use thiserror::Error;

/// Faults raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database rejected or failed a statement
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A credential could not be hashed
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence operations behind each ledger action.
pub trait LedgerStore: Send + Sync {
    /// Inserts a new entry and returns the id assigned to it.
    fn add(&self, entry: &Entry) -> StorageResult<i64>;

    /// Creates a credential. Returns `false` if the username is taken.
    fn register(&self, username: &str, password: &str) -> StorageResult<bool>;

    /// Returns `true` iff the user exists and the password matches.
    fn login(&self, username: &str, password: &str) -> StorageResult<bool>;

    fn user_exists(&self, username: &str) -> StorageResult<bool>;

    /// Entries matching every set filter, oldest first.
    fn search(&self, criteria: &SearchCriteria) -> StorageResult<Vec<Entry>>;

    /// All entries of `username`, oldest first.
    fn list(&self, username: &str) -> StorageResult<Vec<Entry>>;

    /// Deletes one entry if it exists and belongs to `username`.
    fn delete(&self, username: &str, entry_id: i64) -> StorageResult<bool>;

    /// Deletes every entry of `username` and returns how many were removed.
    fn clear(&self, username: &str) -> StorageResult<u64>;
}
