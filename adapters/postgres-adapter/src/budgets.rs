use std::sync::Arc;

use chrono::NaiveDate;
use domain::{Budget, BudgetRepository, CoreError, ListOptions};

use crate::{to_sql_int, PgStore};

type BudgetRow = (String, String, f64, NaiveDate, NaiveDate);

const COLUMNS: &str = "id, description, amount, start_date, end_date";

/// `BudgetRepository` backed by the `budgets` table (dates as `DATE`).
pub struct PgBudgetRepo {
    store: Arc<PgStore>,
}

impl PgBudgetRepo {
    pub fn new(store: Arc<PgStore>) -> Self {
        Self { store }
    }
}

fn row_to_budget((id, description, amount, start_date, end_date): BudgetRow) -> Budget {
    Budget {
        id,
        description,
        amount,
        start_date,
        end_date,
    }
}

impl BudgetRepository for PgBudgetRepo {
    fn create(&self, budget: &Budget) -> Result<(), CoreError> {
        let fut = sqlx::query(
            "INSERT INTO budgets (id, description, amount, start_date, end_date) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&budget.id)
        .bind(&budget.description)
        .bind(budget.amount)
        .bind(budget.start_date)
        .bind(budget.end_date)
        .execute(self.store.pool());
        self.store
            .block_on(fut)
            .map_err(|e| self.store.fail("insert budget", e))?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Budget, CoreError> {
        let sql = format!("SELECT {COLUMNS} FROM budgets WHERE id = $1");
        let fut = sqlx::query_as::<_, BudgetRow>(&sql)
            .bind(id)
            .fetch_one(self.store.pool());
        self.store
            .block_on(fut)
            .map(row_to_budget)
            .map_err(|e| self.store.fail("select budget", e))
    }

    fn update(&self, budget: &Budget) -> Result<Budget, CoreError> {
        let sql = format!(
            "UPDATE budgets SET description = $1, amount = $2, start_date = $3, end_date = $4 \
             WHERE id = $5 RETURNING {COLUMNS}"
        );
        let fut = sqlx::query_as::<_, BudgetRow>(&sql)
            .bind(&budget.description)
            .bind(budget.amount)
            .bind(budget.start_date)
            .bind(budget.end_date)
            .bind(&budget.id)
            .fetch_one(self.store.pool());
        self.store
            .block_on(fut)
            .map(row_to_budget)
            .map_err(|e| self.store.fail("update budget", e))
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let fut = sqlx::query("DELETE FROM budgets WHERE id = $1")
            .bind(id)
            .execute(self.store.pool());
        let done = self
            .store
            .block_on(fut)
            .map_err(|e| self.store.fail("delete budget", e))?;
        match done.rows_affected() {
            0 => Err(CoreError::NotFound),
            _ => Ok(()),
        }
    }

    fn list(&self, options: ListOptions) -> Result<Vec<Budget>, CoreError> {
        let sql = format!("SELECT {COLUMNS} FROM budgets ORDER BY seq DESC LIMIT $1 OFFSET $2");
        let fut = sqlx::query_as::<_, BudgetRow>(&sql)
            .bind(to_sql_int(options.limit))
            .bind(to_sql_int(options.offset))
            .fetch_all(self.store.pool());
        let rows = self
            .store
            .block_on(fut)
            .map_err(|e| self.store.fail("list budgets", e))?;
        Ok(rows.into_iter().map(row_to_budget).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db::fresh_store;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn groceries(id: &str) -> Budget {
        Budget {
            id: id.into(),
            description: "groceries".into(),
            amount: 400.0,
            start_date: date(2024, 3, 1),
            end_date: date(2024, 3, 31),
        }
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn create_then_get_keeps_dates() {
        let (_lock, store) = fresh_store();
        let repo = PgBudgetRepo::new(store);
        let b = groceries("budget_1");
        repo.create(&b).unwrap();
        assert_eq!(repo.get_by_id("budget_1").unwrap(), b);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn update_returns_replaced_row() {
        let (_lock, store) = fresh_store();
        let repo = PgBudgetRepo::new(store);
        repo.create(&groceries("budget_1")).unwrap();

        let mut changed = groceries("budget_1");
        changed.amount = 450.0;
        changed.end_date = date(2024, 4, 15);
        assert_eq!(repo.update(&changed).unwrap(), changed);
        assert_eq!(repo.get_by_id("budget_1").unwrap(), changed);
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn unknown_ids_are_not_found() {
        let (_lock, store) = fresh_store();
        let repo = PgBudgetRepo::new(store);
        assert!(matches!(
            repo.update(&groceries("nope")),
            Err(CoreError::NotFound)
        ));
        assert!(matches!(repo.delete("nope"), Err(CoreError::NotFound)));
        assert!(matches!(repo.get_by_id("nope"), Err(CoreError::NotFound)));
    }

    #[test]
    #[ignore = "needs DATABASE_URL"]
    fn list_is_newest_insert_first() {
        let (_lock, store) = fresh_store();
        let repo = PgBudgetRepo::new(store);
        for id in ["b0", "b1", "b2"] {
            repo.create(&groceries(id)).unwrap();
        }
        repo.delete("b1").unwrap();

        let all = repo.list(ListOptions { limit: 10, offset: 0 }).unwrap();
        let ids: Vec<_> = all.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["b2", "b0"]);

        let second = repo.list(ListOptions { limit: 1, offset: 1 }).unwrap();
        assert_eq!(second[0].id, "b0");
    }
}
