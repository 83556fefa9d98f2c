use std::sync::Arc;

use domain::{Budget, BudgetRepository, CoreError, ListOptions};
use rusqlite::{params, Row};

use crate::{to_sql_int, SqliteStore};

const COLUMNS: &str = "id, description, amount, start_date, end_date";

/// `BudgetRepository` backed by the `budgets` table. Dates are stored as
/// ISO-8601 `YYYY-MM-DD` text.
pub struct SqliteBudgetRepo {
    store: Arc<SqliteStore>,
}

impl SqliteBudgetRepo {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

fn row_to_budget(row: &Row<'_>) -> rusqlite::Result<Budget> {
    Ok(Budget {
        id: row.get(0)?,
        description: row.get(1)?,
        amount: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
    })
}

impl BudgetRepository for SqliteBudgetRepo {
    fn create(&self, budget: &Budget) -> Result<(), CoreError> {
        self.store.execute(
            "INSERT INTO budgets (id, description, amount, start_date, end_date) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                budget.id,
                budget.description,
                budget.amount,
                budget.start_date,
                budget.end_date
            ],
        )?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Budget, CoreError> {
        self.store.query_one(
            &format!("SELECT {COLUMNS} FROM budgets WHERE id = ?1"),
            params![id],
            row_to_budget,
        )
    }

    fn update(&self, budget: &Budget) -> Result<Budget, CoreError> {
        self.store.query_one(
            &format!(
                "UPDATE budgets SET description = ?1, amount = ?2, start_date = ?3, end_date = ?4 \
                 WHERE id = ?5 RETURNING {COLUMNS}"
            ),
            params![
                budget.description,
                budget.amount,
                budget.start_date,
                budget.end_date,
                budget.id
            ],
            row_to_budget,
        )
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        match self
            .store
            .execute("DELETE FROM budgets WHERE id = ?1", params![id])?
        {
            0 => Err(CoreError::NotFound),
            _ => Ok(()),
        }
    }

    fn list(&self, options: ListOptions) -> Result<Vec<Budget>, CoreError> {
        self.store.query_all(
            &format!("SELECT {COLUMNS} FROM budgets ORDER BY seq DESC LIMIT ?1 OFFSET ?2"),
            params![to_sql_int(options.limit), to_sql_int(options.offset)],
            row_to_budget,
        )
    }
}
