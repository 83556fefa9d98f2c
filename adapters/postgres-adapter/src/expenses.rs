use std::sync::Arc;

use domain::{CoreError, Expense, ExpenseRepository, ListOptions};

use crate::{to_sql_int, PgStore};

type ExpenseRow = (String, String, String, f64, String, i64);

const COLUMNS: &str = "id, name, description, amount, currency, date_creation";

/// `ExpenseRepository` backed by the `expenses` table.
pub struct PgExpenseRepo {
    store: Arc<PgStore>,
}

impl PgExpenseRepo {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self { store }
    }
}

fn row_to_expense(row: ExpenseRow) -> Expense {
    let (id, name, description, amount, currency, date_creation) = row;
    Expense {
        id,
        name,
        description,
        amount,
        currency,
        date_creation,
    }
}

impl ExpenseRepository for PgExpenseRepo {
    fn create(&self, expense: &Expense) -> Result<(), CoreError> {
        let fut = sqlx::query(
            "INSERT INTO expenses (id, name, description, amount, currency, date_creation) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&expense.id)
        .bind(&expense.name)
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.currency)
        .bind(expense.date_creation)
        .execute(self.store.pool());
        self.store
            .block_on(fut)
            .map_err(|e| self.store.fail("insert expense", e))?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Expense, CoreError> {
        let sql = format!("SELECT {COLUMNS} FROM expenses WHERE id = $1");
        let fut = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(id)
            .fetch_one(self.store.pool());
        self.store
            .block_on(fut)
            .map(row_to_expense)
            .map_err(|e| self.store.fail("select expense", e))
    }

    fn update(&self, expense: &Expense) -> Result<Expense, CoreError> {
        // date_creation is fixed at insert time.
        let sql = format!(
            "UPDATE expenses SET name = $1, description = $2, amount = $3, currency = $4 \
             WHERE id = $5 RETURNING {COLUMNS}"
        );
        let fut = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(&expense.name)
            .bind(&expense.description)
            .bind(expense.amount)
            .bind(&expense.currency)
            .bind(&expense.id)
            .fetch_one(self.store.pool());
        self.store
            .block_on(fut)
            .map(row_to_expense)
            .map_err(|e| self.store.fail("update expense", e))
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let fut = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(self.store.pool());
        let done = self
            .store
            .block_on(fut)
            .map_err(|e| self.store.fail("delete expense", e))?;
        if done.rows_affected() == 0 {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    fn list(&self, options: ListOptions) -> Result<Vec<Expense>, CoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM expenses \
             ORDER BY date_creation DESC, seq DESC LIMIT $1 OFFSET $2"
        );
        let fut = sqlx::query_as::<_, ExpenseRow>(&sql)
            .bind(to_sql_int(options.limit))
            .bind(to_sql_int(options.offset))
            .fetch_all(self.store.pool());
        let rows = self
            .store
            .block_on(fut)
            .map_err(|e| self.store.fail("list expenses", e))?;
        Ok(rows.into_iter().map(row_to_expense).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db::fresh_store;

    fn lunch(id: &str, ts: i64) -> Expense {
        Expense {
            id: id.into(),
            name: "lunch".into(),
            description: "noodles".into(),
            amount: 12.5,
            currency: "USD".into(),
            date_creation: ts,
        }
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn create_then_get() {
        let (_lock, store) = fresh_store();
        let repo = PgExpenseRepo::new(store);
        let e = lunch("expense_1", 1_700_000_000);
        repo.create(&e).unwrap();
        assert_eq!(repo.get_by_id("expense_1").unwrap(), e);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn duplicate_id_is_a_store_error() {
        let (_lock, store) = fresh_store();
        let repo = PgExpenseRepo::new(store);
        repo.create(&lunch("expense_1", 1)).unwrap();
        assert!(matches!(
            repo.create(&lunch("expense_1", 2)),
            Err(CoreError::Store(_))
        ));
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn update_returns_stored_row_and_keeps_creation_stamp() {
        let (_lock, store) = fresh_store();
        let repo = PgExpenseRepo::new(store);
        repo.create(&lunch("expense_1", 100)).unwrap();

        let mut changed = lunch("expense_1", 555);
        changed.amount = 15.0;
        changed.currency = "EUR".into();
        let stored = repo.update(&changed).unwrap();

        assert_eq!(stored.amount, 15.0);
        assert_eq!(stored.currency, "EUR");
        assert_eq!(stored.date_creation, 100);
        assert_eq!(repo.get_by_id("expense_1").unwrap(), stored);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn missing_rows_are_not_found() {
        let (_lock, store) = fresh_store();
        let repo = PgExpenseRepo::new(store);
        assert!(matches!(repo.get_by_id("nope"), Err(CoreError::NotFound)));
        assert!(matches!(
            repo.update(&lunch("nope", 1)),
            Err(CoreError::NotFound)
        ));
        assert!(matches!(repo.delete("nope"), Err(CoreError::NotFound)));
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn list_is_newest_first_and_windowed() {
        let (_lock, store) = fresh_store();
        let repo = PgExpenseRepo::new(store);
        repo.create(&lunch("a", 10)).unwrap();
        repo.create(&lunch("b", 30)).unwrap();
        repo.create(&lunch("c", 20)).unwrap();
        repo.create(&lunch("d", 20)).unwrap();

        let all = repo.list(ListOptions { limit: 10, offset: 0 }).unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["b", "d", "c", "a"]);

        let page = repo.list(ListOptions { limit: 2, offset: 2 }).unwrap();
        let ids: Vec<_> = page.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);

        repo.delete("b").unwrap();
        assert!(repo
            .list(ListOptions { limit: 5, offset: 3 })
            .unwrap()
            .is_empty());
    }
}
