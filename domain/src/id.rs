//! Identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::EntityKind;

/// Produces identifiers for new records. Every call must return a fresh id.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: EntityKind) -> String;
}

/// Deterministic `<kind>_<n>` ids from an in-process counter.
///
/// Only unique within one process; used by tests and the in-memory demo setup.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, kind: EntityKind) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", kind.as_str(), n)
    }
}

/// Render a 128-bit value as `<kind>_<decimal digits>`.
pub fn format_id(kind: EntityKind, value: u128) -> String {
    format!("{}_{}", kind.as_str(), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_are_prefixed_and_distinct() {
        let ids = SequentialIds::starting_at(7);
        assert_eq!(ids.next_id(EntityKind::Expense), "expense_7");
        assert_eq!(ids.next_id(EntityKind::Budget), "budget_8");
    }

    #[test]
    fn format_id_uses_digits_only() {
        let id = format_id(EntityKind::Expense, u128::MAX);
        let digits = id.strip_prefix("expense_").unwrap();
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }
}
