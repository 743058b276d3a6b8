use crate::domain::cycle::{PaymentCycleConfig, ResetDay, ResetGate, ResetOutcome};
use crate::domain::employee::{PaymentStatus, Position, StatusChange};
use crate::domain::ledger::{
    LedgerEntry, ManualExpense, NewLedgerEntry, NewManualExpense, Page, SourceKind,
};
use crate::domain::ports::{CycleStore, LedgerStore, PaymentStatusStore, PositionCatalog};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    positions: HashMap<String, Position>,
    statuses: HashMap<String, PaymentStatus>,
    cycle: Option<PaymentCycleConfig>,
    expenses: BTreeMap<u64, ManualExpense>,
    ledger: BTreeMap<u64, LedgerEntry>,
    next_status_id: u64,
    next_expense_id: u64,
    next_entry_id: u64,
}

impl Tables {
    fn cycle_config(&mut self, now: DateTime<Utc>) -> &mut PaymentCycleConfig {
        self.cycle.get_or_insert_with(|| PaymentCycleConfig::new(now))
    }

    fn next_id(counter: &mut u64) -> u64 {
        *counter += 1;
        *counter
    }
}

/// A thread-safe in-memory store holding every table.
///
/// All tables live behind one `Arc<RwLock<..>>`; each write method holds the
/// write guard for its whole read-modify-write, which makes every port call a
/// serializable transaction. Ideal for testing and for one-shot CLI runs.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionCatalog for InMemoryStore {
    async fn insert_position(&self, position: Position) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.positions.contains_key(&position.name) {
            return Ok(false);
        }
        tables.positions.insert(position.name.clone(), position);
        Ok(true)
    }

    async fn get_position(&self, name: &str) -> Result<Option<Position>> {
        let tables = self.tables.read().await;
        Ok(tables.positions.get(name).cloned())
    }

    async fn all_positions(&self) -> Result<Vec<Position>> {
        let tables = self.tables.read().await;
        let mut positions: Vec<Position> = tables.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(positions)
    }

    async fn replace_position(&self, position: Position) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.positions.get_mut(&position.name) {
            Some(existing) => {
                *existing = position;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_position(&self, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.positions.remove(name).is_some())
    }
}

#[async_trait]
impl PaymentStatusStore for InMemoryStore {
    async fn insert_status_if_absent(
        &self,
        employee_id: &str,
        position_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatus>> {
        let mut tables = self.tables.write().await;
        if tables.statuses.contains_key(employee_id) {
            return Ok(None);
        }
        let id = Tables::next_id(&mut tables.next_status_id);
        let status = PaymentStatus::new(id, employee_id, position_name.map(str::to_string), now);
        tables
            .statuses
            .insert(employee_id.to_string(), status.clone());
        Ok(Some(status))
    }

    async fn get_status(&self, employee_id: &str) -> Result<Option<PaymentStatus>> {
        let tables = self.tables.read().await;
        Ok(tables.statuses.get(employee_id).cloned())
    }

    async fn all_statuses(&self) -> Result<Vec<PaymentStatus>> {
        let tables = self.tables.read().await;
        let mut statuses: Vec<PaymentStatus> = tables.statuses.values().cloned().collect();
        statuses.sort_by_key(|s| s.id);
        Ok(statuses)
    }

    async fn update_status(
        &self,
        employee_id: &str,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatus>> {
        let mut tables = self.tables.write().await;
        Ok(tables.statuses.get_mut(employee_id).map(|status| {
            status.apply(change, now);
            status.clone()
        }))
    }

    async fn remove_status(&self, employee_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.statuses.remove(employee_id).is_some())
    }
}

#[async_trait]
impl CycleStore for InMemoryStore {
    async fn load_or_init_cycle_config(&self, now: DateTime<Utc>) -> Result<PaymentCycleConfig> {
        let mut tables = self.tables.write().await;
        Ok(tables.cycle_config(now).clone())
    }

    async fn set_reset_day(
        &self,
        day: ResetDay,
        now: DateTime<Utc>,
    ) -> Result<PaymentCycleConfig> {
        let mut tables = self.tables.write().await;
        let config = tables.cycle_config(now);
        config.set_reset_day(day, now);
        Ok(config.clone())
    }

    async fn reset_payment_cycle(
        &self,
        gate: ResetGate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ResetOutcome> {
        let mut tables = self.tables.write().await;
        if gate == ResetGate::IfDue && !tables.cycle_config(now).is_reset_due(today) {
            return Ok(ResetOutcome::NotDue);
        }
        let mut affected = 0;
        for status in tables.statuses.values_mut() {
            if status.reset_for_cycle(now) {
                affected += 1;
            }
        }
        tables.cycle_config(now).stamp_reset(today, now);
        Ok(ResetOutcome::Executed {
            affected,
            reset_date: today,
        })
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_manual_expense(
        &self,
        expense: NewManualExpense,
        now: DateTime<Utc>,
    ) -> Result<(ManualExpense, LedgerEntry)> {
        let mut tables = self.tables.write().await;
        let expense_id = Tables::next_id(&mut tables.next_expense_id);
        let expense = expense.into_expense(expense_id, now);
        let entry_id = Tables::next_id(&mut tables.next_entry_id);
        let entry = NewLedgerEntry::for_manual_expense(&expense).into_entry(entry_id, now);

        tables.expenses.insert(expense_id, expense.clone());
        tables.ledger.insert(entry_id, entry.clone());
        Ok((expense, entry))
    }

    async fn delete_manual_expense(
        &self,
        expense_id: u64,
    ) -> Result<Option<(ManualExpense, Option<LedgerEntry>)>> {
        let mut tables = self.tables.write().await;
        if !tables.expenses.contains_key(&expense_id) {
            return Ok(None);
        }
        let entry_id = tables
            .ledger
            .values()
            .find(|e| e.source_kind == SourceKind::Manual && e.source_ref == Some(expense_id))
            .map(|e| e.id);
        let entry = entry_id.and_then(|id| tables.ledger.remove(&id));
        Ok(tables
            .expenses
            .remove(&expense_id)
            .map(|expense| (expense, entry)))
    }

    async fn get_manual_expense(&self, expense_id: u64) -> Result<Option<ManualExpense>> {
        let tables = self.tables.read().await;
        Ok(tables.expenses.get(&expense_id).cloned())
    }

    async fn all_manual_expenses(&self) -> Result<Vec<ManualExpense>> {
        let tables = self.tables.read().await;
        Ok(tables.expenses.values().cloned().collect())
    }

    async fn append_entry(&self, entry: NewLedgerEntry, now: DateTime<Utc>) -> Result<LedgerEntry> {
        let mut tables = self.tables.write().await;
        let id = Tables::next_id(&mut tables.next_entry_id);
        let entry = entry.into_entry(id, now);
        tables.ledger.insert(id, entry.clone());
        Ok(entry)
    }

    async fn list_entries(&self, page: Page) -> Result<Vec<LedgerEntry>> {
        let snapshot: Vec<LedgerEntry> = {
            let tables = self.tables.read().await;
            tables.ledger.values().cloned().collect()
        };
        Ok(page.apply(snapshot))
    }

    async fn count_entries(&self) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.ledger.len())
    }
}
