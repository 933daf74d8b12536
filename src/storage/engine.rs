//! SQLite Storage Engine
//!
//! This module implements [`LedgerStore`] on top of a SQLite database file.
//!
//! ## Connection Discipline
//!
//! ```text
//!  call ──> connect() ──> one statement ──> drop(conn)
//!              │                              ▲
//!              └──────── error path ──────────┘
//! ```
//!
//! Every operation opens its own connection and releases it when the
//! connection goes out of scope, on success and on every error path alike.
//! Nothing is shared between concurrent callers except the database file,
//! whose locking SQLite handles; a busy timeout absorbs short write
//! contention.
//!
//! ## Amounts
//!
//! Amounts are stored as the decimal's canonical text so the exact digits
//! survive a round trip. Amount filters compare through the deterministic
//! `ledger_amount_cmp(stored, bound)` SQL function, which orders both sides as
//! exact decimals.
//!
//! ## Dates
//!
//! Each connection registers a deterministic `ledger_date(text)` SQL
//! function that maps a well-formed entry date to its ISO date key and
//! anything else to NULL. Date bounds compare keys, so an entry without one
//! never satisfies a bound.

use crate::ledger::{date_key, Entry, EntryType, SearchCriteria};
use crate::storage::credentials::{hash_password, verify_password};
use crate::storage::schema;
use crate::storage::store::{LedgerStore, StorageResult};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Columns selected for every entry read, in [`map_entry`] order.
const ENTRY_COLUMNS: &str = "id, username, amount, type, date, subject, note";

/// Where the database lives and how long a call waits on a locked file.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path of the SQLite database file
    pub path: PathBuf,
    /// How long a statement retries while another writer holds the lock
    pub busy_timeout: Duration,
}

impl StorageConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters describing storage activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Connections opened (one per operation)
    pub connections_opened: u64,
    /// Entries inserted
    pub entries_added: u64,
    /// Entries removed by delete or clear
    pub entries_removed: u64,
}

/// The SQLite-backed ledger store.
///
/// Designed to be wrapped in an `Arc` and shared by every connection task.
///
/// # Example
///
/// ```no_run
/// use ledgerline::storage::{LedgerStore, StorageConfig, StorageEngine};
///
/// let engine = StorageEngine::new(StorageConfig::new("ledger.db"));
/// engine.initialize().unwrap();
///
/// assert!(engine.register("alice", "secret").unwrap());
/// assert!(engine.login("alice", "secret").unwrap());
/// ```
#[derive(Debug)]
pub struct StorageEngine {
    config: StorageConfig,

    /// Statistics: connections opened
    connections_opened: AtomicU64,

    /// Statistics: entries inserted
    entries_added: AtomicU64,

    /// Statistics: entries removed
    entries_removed: AtomicU64,
}

impl StorageEngine {
    /// Creates an engine for the configured database. No connection is
    /// opened until the first call.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            connections_opened: AtomicU64::new(0),
            entries_added: AtomicU64::new(0),
            entries_removed: AtomicU64::new(0),
        }
    }

    /// Creates missing tables, columns and indexes. Safe to call on every
    /// startup.
    pub fn initialize(&self) -> StorageResult<()> {
        let conn = self.connect()?;
        schema::initialize(&conn)?;
        debug!(path = %self.config.path.display(), "Schema initialized");
        Ok(())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns a snapshot of the activity counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            entries_added: self.entries_added.load(Ordering::Relaxed),
            entries_removed: self.entries_removed.load(Ordering::Relaxed),
        }
    }

    /// Acquires a connection for a single operation.
    fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.config.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        register_functions(&conn)?;

        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        trace!(path = %self.config.path.display(), "Opened connection");
        Ok(conn)
    }

    fn query_entries(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> StorageResult<Vec<Entry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, map_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

impl LedgerStore for StorageEngine {
    fn add(&self, entry: &Entry) -> StorageResult<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO entries (username, amount, type, date, subject, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.username,
                entry.amount.to_string(),
                entry.entry_type.as_str(),
                entry.date,
                entry.subject,
                entry.note,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.entries_added.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    fn register(&self, username: &str, password: &str) -> StorageResult<bool> {
        let hash = hash_password(password)?;

        let conn = self.connect()?;
        let result = conn.execute(
            "INSERT INTO users (username, password) VALUES (?1, ?2)",
            params![username, hash],
        );

        match result {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn login(&self, username: &str, password: &str) -> StorageResult<bool> {
        let conn = self.connect()?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        Ok(stored.is_some_and(|hash| verify_password(password, &hash)))
    }

    fn user_exists(&self, username: &str) -> StorageResult<bool> {
        let conn = self.connect()?;
        let exists = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            params![username],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn search(&self, criteria: &SearchCriteria) -> StorageResult<Vec<Entry>> {
        let mut conditions = vec!["username = ?"];
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(criteria.username.clone())];

        if let Some(ref start) = criteria.start_date {
            conditions.push("ledger_date(date) >= ?");
            values.push(Box::new(start.clone()));
        }

        if let Some(ref end) = criteria.end_date {
            conditions.push("ledger_date(date) <= ?");
            values.push(Box::new(end.clone()));
        }

        if let Some(entry_type) = criteria.entry_type {
            conditions.push("type = ?");
            values.push(Box::new(entry_type.as_str()));
        }

        if let Some(min) = criteria.min_amount {
            conditions.push("ledger_amount_cmp(amount, ?) >= 0");
            values.push(Box::new(min.to_string()));
        }

        if let Some(max) = criteria.max_amount {
            conditions.push("ledger_amount_cmp(amount, ?) <= 0");
            values.push(Box::new(max.to_string()));
        }

        let sql = format!(
            "SELECT {} FROM entries WHERE {} ORDER BY id",
            ENTRY_COLUMNS,
            conditions.join(" AND ")
        );

        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), map_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn list(&self, username: &str) -> StorageResult<Vec<Entry>> {
        let sql = format!(
            "SELECT {} FROM entries WHERE username = ?1 ORDER BY id",
            ENTRY_COLUMNS
        );
        self.query_entries(&sql, params![username])
    }

    fn delete(&self, username: &str, entry_id: i64) -> StorageResult<bool> {
        let conn = self.connect()?;
        let affected = conn.execute(
            "DELETE FROM entries WHERE id = ?1 AND username = ?2",
            params![entry_id, username],
        )?;

        self.entries_removed
            .fetch_add(affected as u64, Ordering::Relaxed);
        Ok(affected > 0)
    }

    fn clear(&self, username: &str) -> StorageResult<u64> {
        let conn = self.connect()?;
        let affected = conn.execute("DELETE FROM entries WHERE username = ?1", params![username])?;

        self.entries_removed
            .fetch_add(affected as u64, Ordering::Relaxed);
        Ok(affected as u64)
    }
}

/// Registers the SQL functions every connection relies on.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "ledger_date",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let raw: Option<String> = ctx.get(0)?;
            Ok(raw.as_deref().and_then(date_key))
        },
    )?;

    conn.create_scalar_function(
        "ledger_amount_cmp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let stored = sql_decimal(ctx.get_raw(0));
            let bound = sql_decimal(ctx.get_raw(1));
            Ok(stored
                .zip(bound)
                .map(|(stored, bound)| stored.cmp(&bound) as i32))
        },
    )
}

/// Reads a SQL value as an exact decimal. NULL and unparsable text yield
/// `None`, which makes any comparison against it false.
fn sql_decimal(value: ValueRef<'_>) -> Option<Decimal> {
    match value {
        ValueRef::Text(text) => std::str::from_utf8(text)
            .ok()
            .and_then(|s| Decimal::from_str(s.trim()).ok()),
        ValueRef::Integer(i) => Some(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f).ok(),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

/// True for a primary-key or unique violation.
fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        }
        _ => false,
    }
}

/// Maps a row selected with [`ENTRY_COLUMNS`].
fn map_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let amount: String = row.get(2)?;
    let amount = Decimal::from_str(&amount)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let entry_type: String = row.get(3)?;

    Ok(Entry {
        id: Some(row.get(0)?),
        username: row.get(1)?,
        amount,
        entry_type: EntryType::normalize(&entry_type),
        date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        subject: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}
