//! sqlite-adapter: SQLite store for the expense tracker.
//!
//! Purpose
//! - Provide a file-based relational store so the service runs without an
//!   external database server.
//! - Implements the `ExpenseRepository` and `BudgetRepository` ports from the
//!   `domain` crate on top of a small statement/query layer ([`SqliteStore`]).
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Statements are serialized behind one connection mutex; there are no
//!   multi-statement transactions outside the migration runner.
//! - "No rows" from a single-row query maps to `CoreError::NotFound`, every
//!   other driver error to `CoreError::Store`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use domain::{CoreError, Logger};
use rusqlite::{Connection, Params, Row};

mod budgets;
mod expenses;
pub mod migrations;

pub use budgets::SqliteBudgetRepo;
pub use expenses::SqliteExpenseRepo;

/// Executes parameterized statements and queries against one SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    log: Logger,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path, creating missing
    /// parent directories, and apply pending migrations.
    pub fn open<P: AsRef<Path>>(path: P, log: Logger) -> Result<Self, CoreError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| CoreError::Store(format!("create {}: {e}", dir.display())))?;
        }
        let conn = Connection::open(path).map_err(map_sqerr)?;
        Self::with_connection(conn, log)
    }

    /// Private database that disappears with the process.
    pub fn open_in_memory(log: Logger) -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        Self::with_connection(conn, log)
    }

    fn with_connection(mut conn: Connection, log: Logger) -> Result<Self, CoreError> {
        let applied = migrations::apply_migrations(&mut conn)?;
        if applied > 0 {
            log.info(&format!(
                "applied {applied} migration(s), schema version {}",
                migrations::latest_version()
            ));
        }
        Ok(Self {
            conn: Mutex::new(conn),
            log,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Store("mutex poisoned".into()))
    }

    /// Run an insert/update/delete and return the number of affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize, CoreError> {
        let conn = self.lock()?;
        conn.execute(sql, params).map_err(|e| self.fail(sql, e))
    }

    /// Run a statement expected to yield exactly one row.
    pub fn query_one<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<T, CoreError>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        conn.query_row(sql, params, map).map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CoreError::NotFound,
            other => self.fail(sql, other),
        })
    }

    /// Run a query and map every row; zero rows is an empty vector.
    pub fn query_all<T, P, F>(&self, sql: &str, params: P, map: F) -> Result<Vec<T>, CoreError>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(|e| self.fail(sql, e))?;
        let rows = stmt.query_map(params, map).map_err(|e| self.fail(sql, e))?;
        let items = rows
            .collect::<rusqlite::Result<Vec<T>>>()
            .map_err(|e| self.fail(sql, e))?;
        Ok(items)
    }

    fn fail(&self, sql: &str, e: rusqlite::Error) -> CoreError {
        let verb = sql.split_whitespace().next().unwrap_or("statement");
        self.log.error(&format!("{verb} failed: {e}"));
        map_sqerr(e)
    }
}

pub(crate) fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Store(format!("sqlite error: {e}"))
}

/// Repository windows are `usize`; SQLite binds signed 64-bit integers.
pub(crate) fn to_sql_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
