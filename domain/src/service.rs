use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::id::IdGenerator;
use crate::validate::{
    validate_amount, validate_budget, validate_budget_range, validate_expense, validate_id,
};
use crate::{
    Budget, BudgetRepository, Clock, CoreError, EntityKind, Expense, ExpenseRepository,
    ListOptions, Logger, NewBudget, NewExpense, Operation,
};

/// A repository or validation failure annotated with the operation and record
/// kind it happened in.
#[derive(Debug, Error)]
#[error("{op} {kind}: {source}")]
pub struct ServiceError {
    pub op: Operation,
    pub kind: EntityKind,
    #[source]
    pub source: CoreError,
}

impl ServiceError {
    pub fn new(op: Operation, kind: EntityKind, source: CoreError) -> Self {
        Self { op, kind, source }
    }

    /// The classified failure underneath the context.
    pub fn cause(&self) -> &CoreError {
        &self.source
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.source, CoreError::NotFound)
    }
}

/// Log a failure with full detail and wrap it with its context.
fn fail(
    log: &Logger,
    op: Operation,
    kind: EntityKind,
    id: Option<&str>,
    err: CoreError,
) -> ServiceError {
    let target = id.map(|id| format!(" {id}")).unwrap_or_default();
    match &err {
        CoreError::NotFound => log.warn(&format!("{op} {kind}{target}: not found")),
        CoreError::Validation(msg) => log.warn(&format!("{op} {kind}{target}: {msg}")),
        CoreError::Store(msg) => log.error(&format!("{op} {kind}{target} failed: {msg}")),
    }
    ServiceError::new(op, kind, err)
}

fn unix_seconds(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Application service for expenses.
///
/// Owns identifier and creation-timestamp assignment. Update and delete rely
/// on the repository reporting `NotFound` from the write itself, so there is
/// no separate existence read that a concurrent delete could race.
pub struct ExpenseService<R: ExpenseRepository, G: IdGenerator, C: Clock> {
    repo: R,
    ids: G,
    clock: C,
    log: Logger,
    last_stamp: AtomicI64,
}

impl<R: ExpenseRepository, G: IdGenerator, C: Clock> ExpenseService<R, G, C> {
    pub fn new(repo: R, ids: G, clock: C, log: Logger) -> Self {
        Self {
            repo,
            ids,
            clock,
            log,
            last_stamp: AtomicI64::new(i64::MIN),
        }
    }

    // Never hands out a stamp older than one already issued by this process.
    fn stamp(&self) -> i64 {
        let now = unix_seconds(self.clock.now());
        let prev = self.last_stamp.fetch_max(now, Ordering::Relaxed);
        prev.max(now)
    }

    fn fail(&self, op: Operation, id: Option<&str>, err: CoreError) -> ServiceError {
        fail(&self.log, op, EntityKind::Expense, id, err)
    }

    /// Record a new expense, assigning its id and creation timestamp.
    pub fn create(&self, input: NewExpense) -> Result<Expense, ServiceError> {
        validate_expense(&input).map_err(|e| self.fail(Operation::Create, None, e))?;

        let id = self.ids.next_id(EntityKind::Expense);
        let expense = Expense::from_new(id, self.stamp(), input);
        self.repo
            .create(&expense)
            .map_err(|e| self.fail(Operation::Create, Some(&expense.id), e))?;
        self.log.info(&format!("created expense {}", expense.id));
        Ok(expense)
    }

    pub fn get(&self, id: &str) -> Result<Expense, ServiceError> {
        validate_id(id).map_err(|e| self.fail(Operation::Get, None, e))?;
        self.repo
            .get_by_id(id)
            .map_err(|e| self.fail(Operation::Get, Some(id), e))
    }

    /// Overwrite every field except the id and creation timestamp.
    pub fn update(&self, expense: Expense) -> Result<Expense, ServiceError> {
        validate_id(&expense.id)
            .and_then(|_| validate_amount(expense.amount))
            .map_err(|e| self.fail(Operation::Update, None, e))?;
        let stored = self
            .repo
            .update(&expense)
            .map_err(|e| self.fail(Operation::Update, Some(&expense.id), e))?;
        self.log.info(&format!("updated expense {}", stored.id));
        Ok(stored)
    }

    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        validate_id(id).map_err(|e| self.fail(Operation::Delete, None, e))?;
        self.repo
            .delete(id)
            .map_err(|e| self.fail(Operation::Delete, Some(id), e))?;
        self.log.info(&format!("deleted expense {id}"));
        Ok(())
    }

    /// List one page of expenses, newest first. `page` is 1-based.
    pub fn list(&self, page: i64, limit: i64) -> Result<Vec<Expense>, ServiceError> {
        let options = ListOptions::from_page(page, limit);
        self.log.debug(&format!(
            "listing expenses limit={} offset={}",
            options.limit, options.offset
        ));
        self.repo
            .list(options)
            .map_err(|e| self.fail(Operation::List, None, e))
    }
}

/// Application service for budgets.
///
/// Same contract as [`ExpenseService`]: ids assigned on create, update and
/// delete of an unknown id fail with `NotFound`.
pub struct BudgetService<R: BudgetRepository, G: IdGenerator> {
    repo: R,
    ids: G,
    log: Logger,
}

impl<R: BudgetRepository, G: IdGenerator> BudgetService<R, G> {
    pub fn new(repo: R, ids: G, log: Logger) -> Self {
        Self { repo, ids, log }
    }

    fn fail(&self, op: Operation, id: Option<&str>, err: CoreError) -> ServiceError {
        fail(&self.log, op, EntityKind::Budget, id, err)
    }

    pub fn create(&self, input: NewBudget) -> Result<Budget, ServiceError> {
        validate_budget(&input).map_err(|e| self.fail(Operation::Create, None, e))?;

        let budget = Budget::from_new(self.ids.next_id(EntityKind::Budget), input);
        self.repo
            .create(&budget)
            .map_err(|e| self.fail(Operation::Create, Some(&budget.id), e))?;
        self.log.info(&format!("created budget {}", budget.id));
        Ok(budget)
    }

    pub fn get(&self, id: &str) -> Result<Budget, ServiceError> {
        validate_id(id).map_err(|e| self.fail(Operation::Get, None, e))?;
        self.repo
            .get_by_id(id)
            .map_err(|e| self.fail(Operation::Get, Some(id), e))
    }

    pub fn update(&self, budget: Budget) -> Result<Budget, ServiceError> {
        validate_id(&budget.id)
            .and_then(|_| validate_budget_range(budget.amount, budget.start_date, budget.end_date))
            .map_err(|e| self.fail(Operation::Update, None, e))?;
        let stored = self
            .repo
            .update(&budget)
            .map_err(|e| self.fail(Operation::Update, Some(&budget.id), e))?;
        self.log.info(&format!("updated budget {}", stored.id));
        Ok(stored)
    }

    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        validate_id(id).map_err(|e| self.fail(Operation::Delete, None, e))?;
        self.repo
            .delete(id)
            .map_err(|e| self.fail(Operation::Delete, Some(id), e))?;
        self.log.info(&format!("deleted budget {id}"));
        Ok(())
    }

    /// List one page of budgets, most recently created first. `page` is 1-based.
    pub fn list(&self, page: i64, limit: i64) -> Result<Vec<Budget>, ServiceError> {
        self.repo
            .list(ListOptions::from_page(page, limit))
            .map_err(|e| self.fail(Operation::List, None, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_repo::InMemoryRepo;
    use crate::id::SequentialIds;
    use crate::logging::MemorySink;
    use crate::Level;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct TestClock(SystemTime);
    impl Clock for TestClock {
        fn now(&self) -> SystemTime {
            self.0
        }
    }

    /// Hands out the queued instants in order, repeating the last one.
    struct ScriptedClock(Mutex<Vec<SystemTime>>);
    impl Clock for ScriptedClock {
        fn now(&self) -> SystemTime {
            let mut q = self.0.lock().unwrap();
            if q.len() > 1 {
                q.remove(0)
            } else {
                q[0]
            }
        }
    }

    /// Every call fails like a dropped database connection.
    struct BrokenStore;
    impl ExpenseRepository for BrokenStore {
        fn create(&self, _: &Expense) -> Result<(), CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }
        fn get_by_id(&self, _: &str) -> Result<Expense, CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }
        fn update(&self, _: &Expense) -> Result<Expense, CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }
        fn delete(&self, _: &str) -> Result<(), CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }
        fn list(&self, _: ListOptions) -> Result<Vec<Expense>, CoreError> {
            Err(CoreError::Store("connection refused".into()))
        }
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn expenses() -> ExpenseService<Arc<InMemoryRepo>, SequentialIds, TestClock> {
        ExpenseService::new(
            Arc::new(InMemoryRepo::new()),
            SequentialIds::default(),
            TestClock(at(1_700_000_000)),
            Logger::null(),
        )
    }

    fn budgets() -> BudgetService<Arc<InMemoryRepo>, SequentialIds> {
        BudgetService::new(
            Arc::new(InMemoryRepo::new()),
            SequentialIds::default(),
            Logger::null(),
        )
    }

    fn lunch() -> NewExpense {
        NewExpense {
            name: String::new(),
            description: "lunch".into(),
            amount: 12.5,
            currency: String::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quarter() -> NewBudget {
        NewBudget {
            description: "Q1 food".into(),
            amount: 1200.0,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 3, 31),
        }
    }

    #[test]
    fn create_assigns_id_and_timestamp() {
        let svc = expenses();
        let created = svc.create(lunch()).unwrap();
        assert!(created.id.starts_with("expense_"));
        assert_eq!(created.date_creation, 1_700_000_000);
        assert_eq!(created.description, "lunch");

        let fetched = svc.get(&created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn repeated_creates_get_distinct_ids() {
        let svc = expenses();
        let ids: HashSet<String> = (0..20).map(|_| svc.create(lunch()).unwrap().id).collect();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn creation_stamp_never_goes_backwards() {
        let clock = ScriptedClock(Mutex::new(vec![at(500), at(400), at(600)]));
        let svc = ExpenseService::new(
            InMemoryRepo::new(),
            SequentialIds::default(),
            clock,
            Logger::null(),
        );
        let a = svc.create(lunch()).unwrap();
        let b = svc.create(lunch()).unwrap();
        let c = svc.create(lunch()).unwrap();
        assert_eq!(a.date_creation, 500);
        assert_eq!(b.date_creation, 500);
        assert_eq!(c.date_creation, 600);
    }

    #[test]
    fn update_keeps_id_and_creation_stamp() {
        let svc = expenses();
        let created = svc.create(lunch()).unwrap();

        let mut changed = created.clone();
        changed.amount = 20.0;
        changed.currency = "USD".into();
        changed.date_creation = 1;
        let stored = svc.update(changed).unwrap();

        assert_eq!(stored.id, created.id);
        assert_eq!(stored.amount, 20.0);
        assert_eq!(stored.currency, "USD");
        assert_eq!(stored.date_creation, created.date_creation);
    }

    #[test]
    fn update_unknown_expense_is_not_found() {
        let svc = expenses();
        let ghost = Expense::from_new("expense_404".into(), 0, lunch());
        let err = svc.update(ghost).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.op, Operation::Update);
        assert_eq!(err.kind, EntityKind::Expense);
        assert!(svc.list(1, 10).unwrap().is_empty());
    }

    #[test]
    fn update_without_id_is_rejected() {
        let svc = expenses();
        let err = svc
            .update(Expense::from_new(String::new(), 0, lunch()))
            .unwrap_err();
        assert!(matches!(err.cause(), CoreError::Validation(_)));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let svc = expenses();
        let created = svc.create(lunch()).unwrap();
        svc.delete(&created.id).unwrap();
        assert!(svc.get(&created.id).unwrap_err().is_not_found());
        assert!(svc.delete(&created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn list_respects_limit_and_newest_first() {
        let clock = ScriptedClock(Mutex::new((1..=5).map(|s| at(s * 100)).collect()));
        let svc = ExpenseService::new(
            InMemoryRepo::new(),
            SequentialIds::default(),
            clock,
            Logger::null(),
        );
        for _ in 0..5 {
            svc.create(lunch()).unwrap();
        }

        let first = svc.list(1, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].date_creation, 500);
        assert_eq!(first[1].date_creation, 400);

        let last = svc.list(3, 2).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].date_creation, 100);

        assert!(svc.list(4, 2).unwrap().is_empty());
    }

    #[test]
    fn list_page_zero_reads_first_page() {
        let svc = expenses();
        svc.create(lunch()).unwrap();
        assert_eq!(svc.list(0, 10).unwrap().len(), 1);
        assert_eq!(svc.list(-3, 10).unwrap().len(), 1);
    }

    #[test]
    fn store_failures_carry_context_and_are_logged() {
        let sink = Arc::new(MemorySink::new());
        let svc = ExpenseService::new(
            BrokenStore,
            SequentialIds::default(),
            TestClock(at(0)),
            Logger::new(sink.clone(), "expense-tracker", "ExpenseService"),
        );
        let err = svc.create(lunch()).unwrap_err();
        assert!(matches!(err.cause(), CoreError::Store(_)));
        assert!(err.to_string().starts_with("create expense: store error"));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::Error);
        assert_eq!(events[0].source, "ExpenseService");
        assert!(events[0].message.contains("connection refused"));
    }

    #[test]
    fn budget_crud_flow() {
        let svc = budgets();
        let created = svc.create(quarter()).unwrap();
        assert!(created.id.starts_with("budget_"));
        assert_eq!(svc.get(&created.id).unwrap(), created);

        let mut changed = created.clone();
        changed.amount = 900.0;
        changed.end_date = date(2024, 2, 29);
        let stored = svc.update(changed.clone()).unwrap();
        assert_eq!(stored, changed);

        svc.delete(&created.id).unwrap();
        assert!(svc.get(&created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn budget_mutations_on_unknown_id_are_not_found() {
        let svc = budgets();
        let ghost = Budget::from_new("budget_404".into(), quarter());
        assert!(svc.update(ghost).unwrap_err().is_not_found());
        assert!(svc.delete("budget_404").unwrap_err().is_not_found());
    }

    #[test]
    fn budget_with_inverted_range_is_rejected() {
        let svc = budgets();
        let mut input = quarter();
        input.end_date = date(2023, 12, 1);
        let err = svc.create(input).unwrap_err();
        assert!(matches!(err.cause(), CoreError::Validation(_)));
        assert!(svc.list(1, 10).unwrap().is_empty());

        let created = svc.create(quarter()).unwrap();
        let mut bad = created.clone();
        bad.start_date = date(2025, 1, 1);
        assert!(matches!(
            svc.update(bad).unwrap_err().cause(),
            CoreError::Validation(_)
        ));
        assert_eq!(svc.get(&created.id).unwrap(), created);
    }
}
