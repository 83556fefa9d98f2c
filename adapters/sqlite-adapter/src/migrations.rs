//! SQLite schema migrations.
//!
//! Versions must stay strictly increasing. The applied version is mirrored to
//! `PRAGMA user_version`, and all pending steps run in one transaction.

use domain::CoreError;
use rusqlite::Connection;

use crate::map_sqerr;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
        CREATE TABLE IF NOT EXISTS expenses (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            amount REAL NOT NULL,
            date_creation INTEGER NOT NULL,
            currency TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_expenses_date_creation ON expenses(date_creation);
        "#,
    },
    Migration {
        version: 2,
        sql: r#"
        CREATE TABLE IF NOT EXISTS budgets (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            amount REAL NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL
        );
        "#,
    },
];

/// Latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Apply every pending migration. Returns how many were applied.
pub fn apply_migrations(conn: &mut Connection) -> Result<usize, CoreError> {
    let current = current_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(CoreError::Store(format!(
            "database schema version {current} is newer than supported {latest}"
        )));
    }

    let tx = conn.transaction().map_err(map_sqerr)?;
    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql).map_err(map_sqerr)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            .map_err(map_sqerr)?;
        applied += 1;
    }
    tx.commit().map_err(map_sqerr)?;
    Ok(applied)
}

pub fn current_version(conn: &Connection) -> Result<u32, CoreError> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
        .map_err(map_sqerr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_latest_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(apply_migrations(&mut conn).unwrap(), MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn reapplying_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(apply_migrations(&mut conn).unwrap(), 0);
    }

    #[test]
    fn partial_schema_is_completed() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.execute_batch("PRAGMA user_version = 1;").unwrap();

        assert_eq!(apply_migrations(&mut conn).unwrap(), 1);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'budgets'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn newer_database_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
        assert!(matches!(
            apply_migrations(&mut conn),
            Err(CoreError::Store(_))
        ));
    }
}
