use crate::domain::cycle::{PaymentCycleConfig, ResetDay, ResetGate, ResetOutcome};
use crate::domain::employee::{PaymentStatus, Position, StatusChange};
use crate::domain::ledger::{
    LedgerEntry, ManualExpense, NewLedgerEntry, NewManualExpense, Page, SourceKind,
};
use crate::domain::ports::{CycleStore, LedgerStore, PaymentStatusStore, PositionCatalog};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for the position catalog, keyed by name.
pub const CF_POSITIONS: &str = "positions";
/// Column Family for payment statuses, keyed by employee id.
pub const CF_PAYMENT_STATUS: &str = "payment_status";
/// Column Family holding the cycle configuration singleton.
pub const CF_CYCLE_CONFIG: &str = "cycle_config";
/// Column Family for manual expenses, keyed by big-endian id.
pub const CF_MANUAL_EXPENSES: &str = "manual_expenses";
/// Column Family for ledger rows, keyed by big-endian id.
pub const CF_LEDGER: &str = "ledger";
/// Column Family for id sequences.
pub const CF_META: &str = "meta";

const CYCLE_KEY: &[u8] = b"singleton";
const SEQ_STATUS: &[u8] = b"seq:payment_status";
const SEQ_EXPENSE: &[u8] = b"seq:manual_expenses";
const SEQ_LEDGER: &[u8] = b"seq:ledger";

/// A persistent store implementation using RocksDB.
///
/// Each table lives in its own Column Family with JSON values. Every write
/// method runs under a single-writer lock and commits through one
/// `WriteBatch`, so compound operations (expense plus ledger row, bulk reset
/// plus config stamp) are applied atomically.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every required column family exists.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [
            CF_POSITIONS,
            CF_PAYMENT_STATUS,
            CF_CYCLE_CONFIG,
            CF_MANUAL_EXPENSES,
            CF_LEDGER,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Flushes memtables to disk. The database closes when the last clone
    /// is dropped.
    pub fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PaymentError::StorageError(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Reserves the next id of a sequence. Callers hold the write lock.
    fn next_id(&self, batch: &mut WriteBatch, sequence: &[u8]) -> Result<u64> {
        let current = match self.db.get_cf(self.cf(CF_META)?, sequence)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    PaymentError::StorageError("Corrupt id sequence".to_string())
                })?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        batch.put_cf(self.cf(CF_META)?, sequence, next.to_be_bytes());
        Ok(next)
    }

    fn load_cycle(&self, batch: &mut WriteBatch, now: DateTime<Utc>) -> Result<PaymentCycleConfig> {
        match self.get_json(CF_CYCLE_CONFIG, CYCLE_KEY)? {
            Some(config) => Ok(config),
            None => {
                let config = PaymentCycleConfig::new(now);
                self.put_json(batch, CF_CYCLE_CONFIG, CYCLE_KEY, &config)?;
                Ok(config)
            }
        }
    }
}

#[async_trait]
impl PositionCatalog for RocksDBStore {
    async fn insert_position(&self, position: Position) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = position.name.as_bytes();
        if self.db.get_pinned_cf(self.cf(CF_POSITIONS)?, key)?.is_some() {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_POSITIONS, key, &position)?;
        self.db.write(batch)?;
        Ok(true)
    }

    async fn get_position(&self, name: &str) -> Result<Option<Position>> {
        self.get_json(CF_POSITIONS, name.as_bytes())
    }

    async fn all_positions(&self) -> Result<Vec<Position>> {
        // Keys are names, so the scan is already name-ordered.
        self.scan(CF_POSITIONS)
    }

    async fn replace_position(&self, position: Position) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let key = position.name.as_bytes();
        if self.db.get_pinned_cf(self.cf(CF_POSITIONS)?, key)?.is_none() {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_POSITIONS, key, &position)?;
        self.db.write(batch)?;
        Ok(true)
    }

    async fn remove_position(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_POSITIONS)?;
        if self.db.get_pinned_cf(cf, name.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.db.delete_cf(cf, name.as_bytes())?;
        Ok(true)
    }
}

#[async_trait]
impl PaymentStatusStore for RocksDBStore {
    async fn insert_status_if_absent(
        &self,
        employee_id: &str,
        position_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatus>> {
        let _guard = self.write_lock.lock().await;
        let key = employee_id.as_bytes();
        if self.db.get_pinned_cf(self.cf(CF_PAYMENT_STATUS)?, key)?.is_some() {
            return Ok(None);
        }
        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_STATUS)?;
        let status = PaymentStatus::new(id, employee_id, position_name.map(str::to_string), now);
        self.put_json(&mut batch, CF_PAYMENT_STATUS, key, &status)?;
        self.db.write(batch)?;
        Ok(Some(status))
    }

    async fn get_status(&self, employee_id: &str) -> Result<Option<PaymentStatus>> {
        self.get_json(CF_PAYMENT_STATUS, employee_id.as_bytes())
    }

    async fn all_statuses(&self) -> Result<Vec<PaymentStatus>> {
        let mut statuses: Vec<PaymentStatus> = self.scan(CF_PAYMENT_STATUS)?;
        statuses.sort_by_key(|s| s.id);
        Ok(statuses)
    }

    async fn update_status(
        &self,
        employee_id: &str,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentStatus>> {
        let _guard = self.write_lock.lock().await;
        let key = employee_id.as_bytes();
        let Some(mut status) = self.get_json::<PaymentStatus>(CF_PAYMENT_STATUS, key)? else {
            return Ok(None);
        };
        status.apply(change, now);
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_PAYMENT_STATUS, key, &status)?;
        self.db.write(batch)?;
        Ok(Some(status))
    }

    async fn remove_status(&self, employee_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf(CF_PAYMENT_STATUS)?;
        if self.db.get_pinned_cf(cf, employee_id.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.db.delete_cf(cf, employee_id.as_bytes())?;
        Ok(true)
    }
}

#[async_trait]
impl CycleStore for RocksDBStore {
    async fn load_or_init_cycle_config(&self, now: DateTime<Utc>) -> Result<PaymentCycleConfig> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let config = self.load_cycle(&mut batch, now)?;
        if !batch.is_empty() {
            self.db.write(batch)?;
        }
        Ok(config)
    }

    async fn set_reset_day(
        &self,
        day: ResetDay,
        now: DateTime<Utc>,
    ) -> Result<PaymentCycleConfig> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let mut config = self.load_cycle(&mut batch, now)?;
        config.set_reset_day(day, now);
        self.put_json(&mut batch, CF_CYCLE_CONFIG, CYCLE_KEY, &config)?;
        self.db.write(batch)?;
        Ok(config)
    }

    async fn reset_payment_cycle(
        &self,
        gate: ResetGate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<ResetOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let mut config = self.load_cycle(&mut batch, now)?;
        if gate == ResetGate::IfDue && !config.is_reset_due(today) {
            if !batch.is_empty() {
                self.db.write(batch)?;
            }
            return Ok(ResetOutcome::NotDue);
        }

        let mut affected = 0;
        for mut status in self.scan::<PaymentStatus>(CF_PAYMENT_STATUS)? {
            if status.reset_for_cycle(now) {
                affected += 1;
                self.put_json(
                    &mut batch,
                    CF_PAYMENT_STATUS,
                    status.employee_id.as_bytes(),
                    &status,
                )?;
            }
        }
        config.stamp_reset(today, now);
        self.put_json(&mut batch, CF_CYCLE_CONFIG, CYCLE_KEY, &config)?;
        self.db.write(batch)?;
        Ok(ResetOutcome::Executed {
            affected,
            reset_date: today,
        })
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn create_manual_expense(
        &self,
        expense: NewManualExpense,
        now: DateTime<Utc>,
    ) -> Result<(ManualExpense, LedgerEntry)> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let expense_id = self.next_id(&mut batch, SEQ_EXPENSE)?;
        let expense = expense.into_expense(expense_id, now);
        let entry_id = self.next_id(&mut batch, SEQ_LEDGER)?;
        let entry = NewLedgerEntry::for_manual_expense(&expense).into_entry(entry_id, now);

        self.put_json(&mut batch, CF_MANUAL_EXPENSES, &expense_id.to_be_bytes(), &expense)?;
        self.put_json(&mut batch, CF_LEDGER, &entry_id.to_be_bytes(), &entry)?;
        self.db.write(batch)?;
        Ok((expense, entry))
    }

    async fn delete_manual_expense(
        &self,
        expense_id: u64,
    ) -> Result<Option<(ManualExpense, Option<LedgerEntry>)>> {
        let _guard = self.write_lock.lock().await;
        let key = expense_id.to_be_bytes();
        let Some(expense) = self.get_json::<ManualExpense>(CF_MANUAL_EXPENSES, &key)? else {
            return Ok(None);
        };
        let entry = self
            .scan::<LedgerEntry>(CF_LEDGER)?
            .into_iter()
            .find(|e| e.source_kind == SourceKind::Manual && e.source_ref == Some(expense_id));

        let mut batch = WriteBatch::default();
        if let Some(entry) = &entry {
            batch.delete_cf(self.cf(CF_LEDGER)?, entry.id.to_be_bytes());
        }
        batch.delete_cf(self.cf(CF_MANUAL_EXPENSES)?, key);
        self.db.write(batch)?;
        Ok(Some((expense, entry)))
    }

    async fn get_manual_expense(&self, expense_id: u64) -> Result<Option<ManualExpense>> {
        self.get_json(CF_MANUAL_EXPENSES, &expense_id.to_be_bytes())
    }

    async fn all_manual_expenses(&self) -> Result<Vec<ManualExpense>> {
        self.scan(CF_MANUAL_EXPENSES)
    }

    async fn append_entry(&self, entry: NewLedgerEntry, now: DateTime<Utc>) -> Result<LedgerEntry> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        let id = self.next_id(&mut batch, SEQ_LEDGER)?;
        let entry = entry.into_entry(id, now);
        self.put_json(&mut batch, CF_LEDGER, &id.to_be_bytes(), &entry)?;
        self.db.write(batch)?;
        Ok(entry)
    }

    async fn list_entries(&self, page: Page) -> Result<Vec<LedgerEntry>> {
        Ok(page.apply(self.scan(CF_LEDGER)?))
    }

    async fn count_entries(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.db.iterator_cf(self.cf(CF_LEDGER)?, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}
