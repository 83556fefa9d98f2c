use std::sync::Arc;

use domain::{CoreError, Expense, ExpenseRepository, ListOptions};
use rusqlite::{params, Row};

use crate::{to_sql_int, SqliteStore};

const COLUMNS: &str = "id, name, description, amount, currency, date_creation";

/// `ExpenseRepository` backed by the `expenses` table.
pub struct SqliteExpenseRepo {
    store: Arc<SqliteStore>,
}

impl SqliteExpenseRepo {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

fn row_to_expense(row: &Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        date_creation: row.get(5)?,
    })
}

impl ExpenseRepository for SqliteExpenseRepo {
    fn create(&self, expense: &Expense) -> Result<(), CoreError> {
        self.store.execute(
            "INSERT INTO expenses (id, name, description, amount, currency, date_creation) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                expense.id,
                expense.name,
                expense.description,
                expense.amount,
                expense.currency,
                expense.date_creation
            ],
        )?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Expense, CoreError> {
        self.store.query_one(
            &format!("SELECT {COLUMNS} FROM expenses WHERE id = ?1"),
            params![id],
            row_to_expense,
        )
    }

    fn update(&self, expense: &Expense) -> Result<Expense, CoreError> {
        // date_creation is fixed at insert time.
        self.store.query_one(
            &format!(
                "UPDATE expenses SET name = ?1, description = ?2, amount = ?3, currency = ?4 \
                 WHERE id = ?5 RETURNING {COLUMNS}"
            ),
            params![
                expense.name,
                expense.description,
                expense.amount,
                expense.currency,
                expense.id
            ],
            row_to_expense,
        )
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let affected = self
            .store
            .execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    fn list(&self, options: ListOptions) -> Result<Vec<Expense>, CoreError> {
        self.store.query_all(
            &format!(
                "SELECT {COLUMNS} FROM expenses \
                 ORDER BY date_creation DESC, seq DESC LIMIT ?1 OFFSET ?2"
            ),
            params![to_sql_int(options.limit), to_sql_int(options.offset)],
            row_to_expense,
        )
    }
}
