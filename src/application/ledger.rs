use crate::domain::clock::Clock;
use crate::domain::ledger::{LedgerEntry, ManualExpense, NewLedgerEntry, NewManualExpense, Page};
use crate::domain::money::Salary;
use crate::domain::ports::{LedgerStore, PaymentStatusStore, StoreRef};
use crate::error::{PaymentError, Result};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Keeps the unified expense ledger consistent with its sources.
///
/// Manual expenses and their `manual` ledger rows are created and removed
/// together through single store calls, so no reader ever sees one without
/// the other. Employee payments append permanent history rows.
pub struct LedgerReconciler {
    store: StoreRef,
    clock: Arc<dyn Clock>,
}

impl LedgerReconciler {
    pub fn new(store: StoreRef, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn record_manual_expense(
        &self,
        expense: NewManualExpense,
    ) -> Result<(ManualExpense, LedgerEntry)> {
        let (expense, entry) = self
            .store
            .create_manual_expense(expense, self.clock.now())
            .await?;
        info!(
            expense_id = expense.id,
            entry_id = entry.id,
            category = %expense.category,
            amount = %expense.value,
            "Recorded manual expense"
        );
        Ok((expense, entry))
    }

    /// Removes a manual expense together with its ledger row.
    ///
    /// A missing ledger row is tolerated (logged); a missing expense is
    /// `NotFound`.
    pub async fn remove_manual_expense(&self, expense_id: u64) -> Result<ManualExpense> {
        let (expense, entry) = self
            .store
            .delete_manual_expense(expense_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Manual expense", expense_id))?;
        match entry {
            Some(entry) => info!(expense_id, entry_id = entry.id, "Removed manual expense"),
            None => warn!(expense_id, "Removed manual expense that had no ledger row"),
        }
        Ok(expense)
    }

    /// Appends the ledger row for a confirmed payment.
    ///
    /// Zero-salary payments leave no row; `None` is returned for them.
    pub async fn record_employee_payment(
        &self,
        employee_id: &str,
        amount: Salary,
        position_name: Option<&str>,
        date: NaiveDate,
    ) -> Result<Option<LedgerEntry>> {
        let Some(amount) = amount.as_amount() else {
            debug!(employee_id, "Zero-salary payment, no ledger row written");
            return Ok(None);
        };
        let status_id = self.store.get_status(employee_id).await?.map(|s| s.id);
        let entry =
            NewLedgerEntry::for_employee_payment(employee_id, amount, position_name, date, status_id);
        let entry = self.store.append_entry(entry, self.clock.now()).await?;
        info!(employee_id, entry_id = entry.id, amount = %entry.amount, "Recorded employee payment in ledger");
        Ok(Some(entry))
    }

    /// Appends a free-standing operating expense row.
    pub async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry> {
        self.store.append_entry(entry, self.clock.now()).await
    }

    /// Ledger rows ordered by expense date descending, ties by id ascending.
    pub async fn list(&self, page: Page) -> Result<Vec<LedgerEntry>> {
        self.store.list_entries(page).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count_entries().await
    }

    pub async fn manual_expenses(&self) -> Result<Vec<ManualExpense>> {
        self.store.all_manual_expenses().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::ledger::SourceKind;
    use crate::infrastructure::in_memory::InMemoryStore;
    use chrono::Datelike;
    use rust_decimal_macros::dec;

    fn reconciler() -> (Arc<LedgerReconciler>, Arc<InMemoryStore>, NaiveDate) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::on(2025, 3, 12));
        let today = clock.today();
        (Arc::new(LedgerReconciler::new(store.clone(), clock)), store, today)
    }

    #[tokio::test]
    async fn test_manual_expense_has_exactly_one_row() {
        let (ledger, _store, today) = reconciler();
        let new = NewManualExpense::new(today, "Rent", Some("March".into()), dec!(1200), "Ana").unwrap();
        let (expense, entry) = ledger.record_manual_expense(new).await.unwrap();

        assert_eq!(entry.source_kind, SourceKind::Manual);
        assert_eq!(entry.source_ref, Some(expense.id));
        assert_eq!(entry.description, "Manual expense - Rent: March");
        assert_eq!(ledger.count().await.unwrap(), 1);

        ledger.remove_manual_expense(expense.id).await.unwrap();
        assert_eq!(ledger.count().await.unwrap(), 0);
        assert!(ledger.manual_expenses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_expense_is_not_found() {
        let (ledger, _store, _today) = reconciler();
        let err = ledger.remove_manual_expense(42).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_zero_salary_payment_writes_nothing() {
        let (ledger, _store, today) = reconciler();
        let entry = ledger
            .record_employee_payment("E1", Salary::ZERO, Some("MANAGER"), today)
            .await
            .unwrap();
        assert!(entry.is_none());
        assert_eq!(ledger.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_payment_row_references_status() {
        let (ledger, store, today) = reconciler();
        let status = store
            .insert_status_if_absent("E1", Some("CLEANER"), chrono::Utc::now())
            .await
            .unwrap()
            .unwrap();
        let entry = ledger
            .record_employee_payment("E1", Salary::new(dec!(1400)).unwrap(), Some("CLEANER"), today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.source_kind, SourceKind::EmployeePayment);
        assert_eq!(entry.source_ref, Some(status.id));
        assert_eq!(entry.description, "Employee payment - E1 (CLEANER)");
        assert_eq!(entry.expense_date.month(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_and_delete_keep_bijection() {
        let (ledger, _store, today) = reconciler();
        let mut handles = Vec::new();
        for i in 0..40u32 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                let new = NewManualExpense::new(
                    today,
                    format!("Cat{i}"),
                    None,
                    rust_decimal::Decimal::from(i + 1),
                    "Ops",
                )
                .unwrap();
                let (expense, _) = ledger.record_manual_expense(new).await.unwrap();
                if i % 2 == 0 {
                    ledger.remove_manual_expense(expense.id).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let expenses = ledger.manual_expenses().await.unwrap();
        let rows = ledger.list(Page::new(1000, 0)).await.unwrap();
        assert_eq!(expenses.len(), 20);
        assert_eq!(rows.len(), 20);
        for expense in &expenses {
            let matching = rows
                .iter()
                .filter(|r| r.source_kind == SourceKind::Manual && r.source_ref == Some(expense.id))
                .count();
            assert_eq!(matching, 1);
        }
    }
}
