//! Schema Initialization
//!
//! Creates the credential and entry tables and their indexes. Every step is
//! additive and idempotent, so it runs on each startup against new and
//! existing databases alike.
//!
//! ```text
//! users                      entries
//! ┌──────────────────┐       ┌──────────────────────────────┐
//! │ username  (PK)   │       │ id        INTEGER PK AUTOINC │
//! │ password  (hash) │       │ username  TEXT    (indexed)  │
//! └──────────────────┘       │ amount    TEXT    (decimal)  │
//!                            │ type      TEXT    (indexed)  │
//!                            │ date      TEXT    (indexed)  │
//!                            │ subject   TEXT               │
//!                            │ note      TEXT               │
//!                            └──────────────────────────────┘
//! ```
//!
//! Databases created before entries carried a type gain the `type` column
//! here, with every existing row reading as `expense`.

use crate::storage::store::StorageResult;
use rusqlite::Connection;
use tracing::info;

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY,
        password TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        amount TEXT NOT NULL,
        type TEXT NOT NULL DEFAULT 'expense',
        date TEXT,
        subject TEXT,
        note TEXT
    );
";

const ADD_TYPE_COLUMN: &str =
    "ALTER TABLE entries ADD COLUMN type TEXT NOT NULL DEFAULT 'expense'";

const CREATE_INDEXES: &str = "
    CREATE INDEX IF NOT EXISTS idx_entries_username ON entries(username);
    CREATE INDEX IF NOT EXISTS idx_entries_date ON entries(date);
    CREATE INDEX IF NOT EXISTS idx_entries_type ON entries(type);
";

/// Brings the schema up to date. Safe to re-run.
pub fn initialize(conn: &Connection) -> StorageResult<()> {
    // Readers keep going while a writer commits
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(CREATE_TABLES)?;

    if !has_column(conn, "entries", "type")? {
        conn.execute(ADD_TYPE_COLUMN, [])?;
        info!("Added type column to entries table");
    }

    conn.execute_batch(CREATE_INDEXES)?;
    Ok(())
}

/// Returns true if `table` has a column named `column`.
fn has_column(conn: &Connection, table: &str, column: &str) -> StorageResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;

    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'entries'")
            .unwrap();
        let names = stmt.query_map([], |row| row.get::<_, String>(0)).unwrap();
        names.map(|n| n.unwrap()).collect()
    }

    #[test]
    fn test_initialize_creates_schema() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        assert!(has_column(&conn, "users", "password").unwrap());
        assert!(has_column(&conn, "entries", "type").unwrap());

        let indexes = index_names(&conn);
        assert!(indexes.contains(&"idx_entries_username".to_string()));
        assert!(indexes.contains(&"idx_entries_date".to_string()));
        assert!(indexes.contains(&"idx_entries_type".to_string()));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        conn.execute(
            "INSERT INTO entries (username, amount, type, date, subject, note)
             VALUES ('alice', '5.0', 'income', '2023-01-01', 'a', 'b')",
            [],
        )
        .unwrap();

        initialize(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_initialize_adds_missing_type_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                amount TEXT NOT NULL,
                date TEXT,
                subject TEXT,
                note TEXT
            );
            INSERT INTO entries (username, amount, date) VALUES ('alice', '9.5', '2022-05-01');",
        )
        .unwrap();
        assert!(!has_column(&conn, "entries", "type").unwrap());

        initialize(&conn).unwrap();

        let entry_type: String = conn
            .query_row("SELECT type FROM entries WHERE username = 'alice'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(entry_type, "expense");
    }
}
