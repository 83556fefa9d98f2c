//! PostgreSQL schema migrations, tracked in `schema_migrations`.

use domain::CoreError;
use sqlx::PgPool;

use crate::map_pgerr;

struct Migration {
    version: i32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: r#"
        CREATE TABLE IF NOT EXISTS expenses (
            seq BIGSERIAL PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            amount DOUBLE PRECISION NOT NULL,
            date_creation BIGINT NOT NULL,
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
            seq BIGSERIAL PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            amount DOUBLE PRECISION NOT NULL,
            start_date DATE NOT NULL,
            end_date DATE NOT NULL
        );
        "#,
    },
];

/// Apply pending migrations in one transaction. Returns how many ran.
pub(crate) async fn apply_migrations(pool: &PgPool) -> Result<usize, CoreError> {
    let mut tx = pool.begin().await.map_err(map_pgerr)?;

    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(&mut *tx)
    .await
    .map_err(map_pgerr)?;

    let (current,): (i32,) =
        sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_pgerr)?;

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(map_pgerr)?;
        sqlx::query("INSERT INTO schema_migrations (version) VALUES ($1)")
            .bind(migration.version)
            .execute(&mut *tx)
            .await
            .map_err(map_pgerr)?;
        applied += 1;
    }

    tx.commit().await.map_err(map_pgerr)?;
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_strictly_increase() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(MIGRATIONS[0].version, 1);
    }
}
