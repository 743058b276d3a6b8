use super::cycle::{PaymentCycleConfig, ResetDay, ResetGate, ResetOutcome};
use super::employee::{PaymentStatus, Position, StatusChange};
use super::ledger::{LedgerEntry, ManualExpense, NewLedgerEntry, NewManualExpense, Page};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

#[async_trait]
pub trait PositionCatalog: Send + Sync {
    /// Inserts a position unless one with the same name exists; returns
    /// whether it was inserted.
    async fn insert_position(&self, position: Position) -> Result<bool>;
    async fn get_position(&self, name: &str) -> Result<Option<Position>>;
    async fn all_positions(&self) -> Result<Vec<Position>>;
    /// Overwrites an existing position; returns false if it does not exist.
    async fn replace_position(&self, position: Position) -> Result<bool>;
    async fn remove_position(&self, name: &str) -> Result<bool>;
}

#[async_trait]
pub trait PaymentStatusStore: Send + Sync {
    /// Creates an unpaid status for `employee_id` if none exists. Returns the
    /// new row, or `None` when one was already there.
    async fn insert_status_if_absent(
        &self,
        employee_id: &str,
        position_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatus>>;
    async fn get_status(&self, employee_id: &str) -> Result<Option<PaymentStatus>>;
    async fn all_statuses(&self) -> Result<Vec<PaymentStatus>>;
    /// Atomically applies `change` to an existing row. `None` if absent.
    async fn update_status(
        &self,
        employee_id: &str,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatus>>;
    async fn remove_status(&self, employee_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait CycleStore: Send + Sync {
    /// Returns the singleton, creating it with the default reset day first.
    async fn load_or_init_cycle_config(&self, now: DateTime<Utc>) -> Result<PaymentCycleConfig>;
    async fn set_reset_day(&self, day: ResetDay, now: DateTime<Utc>)
    -> Result<PaymentCycleConfig>;
    /// In one atomic unit: evaluate `gate` against the stored config, flip
    /// every paid status to unpaid, and stamp `last_reset_date = today`.
    async fn reset_payment_cycle(
        &self,
        gate: ResetGate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ResetOutcome>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts the expense and its `manual` ledger row as one unit.
    async fn create_manual_expense(
        &self,
        expense: NewManualExpense,
        now: DateTime<Utc>,
    ) -> Result<(ManualExpense, LedgerEntry)>;
    /// Deletes the `manual` ledger row for `expense_id` (if any), then the
    /// expense itself, as one unit. `None` if the expense does not exist.
    async fn delete_manual_expense(
        &self,
        expense_id: u64,
    ) -> Result<Option<(ManualExpense, Option<LedgerEntry>)>>;
    async fn get_manual_expense(&self, expense_id: u64) -> Result<Option<ManualExpense>>;
    async fn all_manual_expenses(&self) -> Result<Vec<ManualExpense>>;
    async fn append_entry(&self, entry: NewLedgerEntry, now: DateTime<Utc>) -> Result<LedgerEntry>;
    async fn list_entries(&self, page: Page) -> Result<Vec<LedgerEntry>>;
    async fn count_entries(&self) -> Result<usize>;
}

/// Everything the engine needs from persistent storage.
pub trait FinanceStore: PositionCatalog + PaymentStatusStore + CycleStore + LedgerStore {}

impl<T> FinanceStore for T where T: PositionCatalog + PaymentStatusStore + CycleStore + LedgerStore {}

pub type StoreRef = Arc<dyn FinanceStore>;

/// A message taken off an inbound queue and not yet settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tag: u64,
    pub queue: String,
    pub body: Vec<u8>,
    /// How many times this message was handed back before this delivery.
    pub redelivered: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (or deliberately dropped); remove from the queue.
    Ack,
    /// Hand back to the bus for redelivery.
    Requeue,
    /// Never deliver again.
    Reject,
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Next delivery, or `None` once the source is closed and drained.
    async fn receive(&self) -> Option<Delivery>;
    async fn settle(&self, delivery: Delivery, disposition: Disposition) -> Result<()>;
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, queue: &str, body: &[u8]) -> Result<()>;
}
