use std::sync::Mutex;

use crate::{Budget, BudgetRepository, CoreError, Expense, ExpenseRepository, ListOptions};

/// Simple in-memory repository for tests and the `memory` storage provider.
/// Records are kept in insertion order behind a mutex per record kind.
pub struct InMemoryRepo {
    expenses: Mutex<Vec<Expense>>,
    budgets: Mutex<Vec<Budget>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            expenses: Mutex::new(Vec::new()),
            budgets: Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> CoreError {
    CoreError::Store("mutex poisoned".into())
}

fn window<T>(items: impl Iterator<Item = T>, options: ListOptions) -> Vec<T> {
    items.skip(options.offset).take(options.limit).collect()
}

impl ExpenseRepository for InMemoryRepo {
    fn create(&self, expense: &Expense) -> Result<(), CoreError> {
        let mut rows = self.expenses.lock().map_err(poisoned)?;
        if rows.iter().any(|e| e.id == expense.id) {
            return Err(CoreError::Store(format!("duplicate id {}", expense.id)));
        }
        rows.push(expense.clone());
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Expense, CoreError> {
        let rows = self.expenses.lock().map_err(poisoned)?;
        rows.iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or(CoreError::NotFound)
    }

    fn update(&self, expense: &Expense) -> Result<Expense, CoreError> {
        let mut rows = self.expenses.lock().map_err(poisoned)?;
        let row = rows
            .iter_mut()
            .find(|e| e.id == expense.id)
            .ok_or(CoreError::NotFound)?;
        row.name = expense.name.clone();
        row.description = expense.description.clone();
        row.amount = expense.amount;
        row.currency = expense.currency.clone();
        Ok(row.clone())
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let mut rows = self.expenses.lock().map_err(poisoned)?;
        let before = rows.len();
        rows.retain(|e| e.id != id);
        if rows.len() == before {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn list(&self, options: ListOptions) -> Result<Vec<Expense>, CoreError> {
        let rows = self.expenses.lock().map_err(poisoned)?;
        // Newest insert first, then a stable sort keeps that order within equal stamps.
        let mut ordered: Vec<&Expense> = rows.iter().rev().collect();
        ordered.sort_by(|a, b| b.date_creation.cmp(&a.date_creation));
        Ok(window(ordered.into_iter().cloned(), options))
    }
}

impl BudgetRepository for InMemoryRepo {
    fn create(&self, budget: &Budget) -> Result<(), CoreError> {
        let mut rows = self.budgets.lock().map_err(poisoned)?;
        if rows.iter().any(|b| b.id == budget.id) {
            return Err(CoreError::Store(format!("duplicate id {}", budget.id)));
        }
        rows.push(budget.clone());
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Budget, CoreError> {
        let rows = self.budgets.lock().map_err(poisoned)?;
        rows.iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(CoreError::NotFound)
    }

    fn update(&self, budget: &Budget) -> Result<Budget, CoreError> {
        let mut rows = self.budgets.lock().map_err(poisoned)?;
        let row = rows
            .iter_mut()
            .find(|b| b.id == budget.id)
            .ok_or(CoreError::NotFound)?;
        *row = budget.clone();
        Ok(row.clone())
    }

    fn delete(&self, id: &str) -> Result<(), CoreError> {
        let mut rows = self.budgets.lock().map_err(poisoned)?;
        let before = rows.len();
        rows.retain(|b| b.id != id);
        if rows.len() == before {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    fn list(&self, options: ListOptions) -> Result<Vec<Budget>, CoreError> {
        let rows = self.budgets.lock().map_err(poisoned)?;
        Ok(window(rows.iter().rev().cloned(), options))
    }
}
