//! Database connection and statement execution

use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::Result;

/// Version string of the linked SQLite library.
pub fn engine_version() -> &'static str {
    rusqlite::version()
}

/// Outcome of a single executed statement.
///
/// Statements that produce rows report how many were visited; all others
/// report the change count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub rows: usize,
    pub changes: usize,
}

#[derive(Debug)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(&path)?;

        // Enable foreign keys
        conn.pragma_update(None, "foreign_keys", "ON")?;

        // WAL mode for better concurrent performance
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        tracing::debug!(path = %path.as_ref().display(), "opened database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute one SQL statement.
    ///
    /// Row-producing statements are stepped to completion and counted;
    /// everything else reports the number of changed rows.
    pub fn exec(&self, statement: &str) -> Result<ExecOutcome> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(statement)?;

            if stmt.column_count() > 0 {
                let mut rows = stmt.query([])?;
                let mut count = 0usize;
                while rows.next()?.is_some() {
                    count += 1;
                }
                Ok(ExecOutcome {
                    rows: count,
                    changes: 0,
                })
            } else {
                let changes = stmt.execute([])?;
                Ok(ExecOutcome { rows: 0, changes })
            }
        })
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}
