//! Lightweight input validation helpers. Keep logic minimal and deterministic.

use chrono::NaiveDate;

use crate::{CoreError, NewBudget, NewExpense};

/// Reject empty or whitespace-only identifiers.
pub fn validate_id(id: &str) -> Result<(), CoreError> {
    if id.trim().is_empty() {
        return Err(CoreError::Validation("missing id".into()));
    }
    Ok(())
}

/// Amounts are signed but must be real numbers.
pub fn validate_amount(amount: f64) -> Result<(), CoreError> {
    if !amount.is_finite() {
        return Err(CoreError::Validation("amount must be a finite number".into()));
    }
    Ok(())
}

/// Name, description and currency are free text; only the amount is checked.
pub fn validate_expense(input: &NewExpense) -> Result<(), CoreError> {
    validate_amount(input.amount)
}

/// A budget must not end before it starts.
pub fn validate_budget(input: &NewBudget) -> Result<(), CoreError> {
    validate_budget_range(input.amount, input.start_date, input.end_date)
}

pub fn validate_budget_range(
    amount: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<(), CoreError> {
    validate_amount(amount)?;
    if end_date < start_date {
        return Err(CoreError::Validation(
            "end_date must not be before start_date".into(),
        ));
    }
    Ok(())
}
