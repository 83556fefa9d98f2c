//! Domain library for the expense tracker.
//!
//! Holds the record types (expenses and budgets), the ports (repository, id,
//! clock and log-sink traits) and the error vocabulary shared by every layer.
//! Storage adapters and HTTP concerns live in their own crates.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::NaiveDate;
use thiserror::Error;

/// The record kinds managed by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Expense,
    Budget,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Expense => "expense",
            EntityKind::Budget => "budget",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service operations, used as error and log context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    Update,
    Delete,
    List,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input data for recording a new expense.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewExpense {
    pub name: String,
    pub description: String,
    pub amount: f64,
    pub currency: String,
}

/// Stored expense.
#[derive(Clone, Debug, PartialEq)]
pub struct Expense {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Signed amount; currency is free text and not checked against it.
    pub amount: f64,
    pub currency: String,
    /// Seconds since the Unix epoch. Assigned on create, never rewritten.
    pub date_creation: i64,
}

impl Expense {
    /// Build a stored expense from create input plus the service-assigned fields.
    pub fn from_new(id: String, date_creation: i64, input: NewExpense) -> Self {
        Self {
            id,
            name: input.name,
            description: input.description,
            amount: input.amount,
            currency: input.currency,
            date_creation,
        }
    }
}

/// Input data for a new budget.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBudget {
    pub description: String,
    pub amount: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Stored budget covering a calendar date range.
#[derive(Clone, Debug, PartialEq)]
pub struct Budget {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Budget {
    pub fn from_new(id: String, input: NewBudget) -> Self {
        Self {
            id,
            description: input.description,
            amount: input.amount,
            start_date: input.start_date,
            end_date: input.end_date,
        }
    }
}

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 500;

/// Window handed to repository list queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    pub offset: usize,
}

impl ListOptions {
    /// Translate a 1-based page number and page size into a window.
    ///
    /// Pages below 1 are treated as the first page and a negative size as an
    /// empty page, so the resulting window is always non-negative. Sizes above
    /// [`MAX_PAGE_SIZE`] are capped.
    pub fn from_page(page: i64, limit: i64) -> Self {
        let limit = usize::try_from(limit).unwrap_or(0).min(MAX_PAGE_SIZE);
        let page = usize::try_from(page.max(1)).unwrap_or(usize::MAX);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Repository port for expenses.
pub trait ExpenseRepository: Send + Sync {
    /// Insert a fully populated expense (identifier already assigned).
    fn create(&self, expense: &Expense) -> Result<(), CoreError>;
    /// Fetch one expense; `CoreError::NotFound` when no row matches.
    fn get_by_id(&self, id: &str) -> Result<Expense, CoreError>;
    /// Overwrite the mutable fields of the row with the same id and return the
    /// stored row. The creation timestamp is left untouched.
    fn update(&self, expense: &Expense) -> Result<Expense, CoreError>;
    fn delete(&self, id: &str) -> Result<(), CoreError>;
    /// Most recently created first.
    fn list(&self, options: ListOptions) -> Result<Vec<Expense>, CoreError>;
}

/// Repository port for budgets.
pub trait BudgetRepository: Send + Sync {
    fn create(&self, budget: &Budget) -> Result<(), CoreError>;
    fn get_by_id(&self, id: &str) -> Result<Budget, CoreError>;
    fn update(&self, budget: &Budget) -> Result<Budget, CoreError>;
    fn delete(&self, id: &str) -> Result<(), CoreError>;
    /// Most recently inserted first.
    fn list(&self, options: ListOptions) -> Result<Vec<Budget>, CoreError>;
}

impl<T: ExpenseRepository + ?Sized> ExpenseRepository for Arc<T> {
    fn create(&self, expense: &Expense) -> Result<(), CoreError> {
        (**self).create(expense)
    }
    fn get_by_id(&self, id: &str) -> Result<Expense, CoreError> {
        (**self).get_by_id(id)
    }
    fn update(&self, expense: &Expense) -> Result<Expense, CoreError> {
        (**self).update(expense)
    }
    fn delete(&self, id: &str) -> Result<(), CoreError> {
        (**self).delete(id)
    }
    fn list(&self, options: ListOptions) -> Result<Vec<Expense>, CoreError> {
        (**self).list(options)
    }
}

impl<T: BudgetRepository + ?Sized> BudgetRepository for Arc<T> {
    fn create(&self, budget: &Budget) -> Result<(), CoreError> {
        (**self).create(budget)
    }
    fn get_by_id(&self, id: &str) -> Result<Budget, CoreError> {
        (**self).get_by_id(id)
    }
    fn update(&self, budget: &Budget) -> Result<Budget, CoreError> {
        (**self).update(budget)
    }
    fn delete(&self, id: &str) -> Result<(), CoreError> {
        (**self).delete(id)
    }
    fn list(&self, options: ListOptions) -> Result<Vec<Budget>, CoreError> {
        (**self).list(options)
    }
}

/// Core domain errors shared by repositories and services.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required field or parameter is missing or malformed.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    /// Any storage failure that is not a missing row.
    #[error("store error: {0}")]
    Store(String),
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - domain library loaded", pkg, ver)
}

pub mod adapters;
pub mod id;
pub mod logging;
pub mod service;
pub mod validate;

pub use logging::{Level, LogSink, Logger};
