use super::catalog::PositionService;
use super::ingestion::EventIngestor;
use super::ledger::LedgerReconciler;
use super::payments::{PaymentConfirmation, PaymentService};
use super::publisher::{OutboundPublisher, PublishStats};
use super::scheduler::PaymentCycleScheduler;
use super::seed;
use crate::domain::clock::Clock;
use crate::domain::cycle::{PaymentCycleConfig, ResetOutcome};
use crate::domain::employee::PaymentStatus;
use crate::domain::events::OutboundEvent;
use crate::domain::ledger::{LedgerEntry, ManualExpense, NewManualExpense, Page};
use crate::domain::ports::StoreRef;
use crate::error::Result;
use chrono::NaiveDate;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

/// The entry point for every operator action and the wiring for the
/// background parts of the system.
///
/// `FinanceEngine` owns the services that share one store and one publisher.
/// Every action commits its state change before queueing the outbound events
/// that describe it.
pub struct FinanceEngine {
    clock: Arc<dyn Clock>,
    publisher: Arc<OutboundPublisher>,
    positions: Arc<PositionService>,
    ledger: Arc<LedgerReconciler>,
    payments: PaymentService,
    scheduler: Arc<PaymentCycleScheduler>,
    ingestor: Arc<EventIngestor>,
}

impl FinanceEngine {
    /// Creates a new `FinanceEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - The backing store for every table.
    /// * `clock` - Source of "now" and of the cycle's calendar date.
    /// * `publisher` - Outbound event queue; already started.
    pub fn new(store: StoreRef, clock: Arc<dyn Clock>, publisher: Arc<OutboundPublisher>) -> Self {
        let positions = Arc::new(PositionService::new(Arc::clone(&store)));
        let ledger = Arc::new(LedgerReconciler::new(Arc::clone(&store), Arc::clone(&clock)));
        let payments = PaymentService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&positions),
            Arc::clone(&ledger),
            Arc::clone(&publisher),
        );
        let scheduler = Arc::new(PaymentCycleScheduler::new(
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let ingestor = Arc::new(EventIngestor::new(store, Arc::clone(&clock)));
        Self {
            clock,
            publisher,
            positions,
            ledger,
            payments,
            scheduler,
            ingestor,
        }
    }

    pub async fn confirm_payment(&self, employee_id: &str) -> Result<PaymentConfirmation> {
        self.payments.confirm_payment(employee_id).await
    }

    pub async fn dismiss_employee(&self, employee_id: &str) -> Result<PaymentStatus> {
        self.payments.dismiss_employee(employee_id).await
    }

    pub async fn create_manual_expense(
        &self,
        expense: NewManualExpense,
    ) -> Result<(ManualExpense, LedgerEntry)> {
        let (expense, entry) = self.ledger.record_manual_expense(expense).await?;
        self.publisher.publish(OutboundEvent::ExpenseRegistered {
            amount: expense.value.value(),
            category: expense.category.clone(),
            description: expense.description.clone(),
            date: expense.date,
            responsible: expense.responsible.clone(),
        });
        Ok((expense, entry))
    }

    pub async fn delete_manual_expense(&self, expense_id: u64) -> Result<ManualExpense> {
        let expense = self.ledger.remove_manual_expense(expense_id).await?;
        self.publisher.publish(OutboundEvent::ExpenseDeleted {
            id: expense.id,
            deleted_at: self.clock.now(),
        });
        Ok(expense)
    }

    pub async fn get_or_create_cycle_config(&self) -> Result<PaymentCycleConfig> {
        self.scheduler.config().await
    }

    pub async fn update_cycle_config(&self, reset_day: u32) -> Result<PaymentCycleConfig> {
        self.scheduler.update_config(reset_day).await
    }

    pub async fn check_and_auto_reset(&self) -> Result<ResetOutcome> {
        self.scheduler.check_and_auto_reset().await
    }

    pub async fn manual_reset(&self) -> Result<ResetOutcome> {
        self.scheduler.manual_reset().await
    }

    pub async fn next_reset_date(&self) -> Result<NaiveDate> {
        self.scheduler.next_reset_date().await
    }

    pub async fn list_ledger(&self, limit: usize, offset: usize) -> Result<Vec<LedgerEntry>> {
        self.ledger.list(Page::new(limit, offset)).await
    }

    pub async fn manual_expenses(&self) -> Result<Vec<ManualExpense>> {
        let mut expenses = self.ledger.manual_expenses().await?;
        expenses.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(expenses)
    }

    pub async fn statuses(&self) -> Result<Vec<PaymentStatus>> {
        self.payments.statuses().await
    }

    pub fn positions(&self) -> &PositionService {
        &self.positions
    }

    pub fn ingestor(&self) -> Arc<EventIngestor> {
        Arc::clone(&self.ingestor)
    }

    pub fn scheduler(&self) -> Arc<PaymentCycleScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Startup sequence: seed the position catalog, run the reset check, and
    /// optionally bootstrap demo data.
    ///
    /// With `check_reset` false the reset check is left to the caller and the
    /// returned outcome is `None`.
    pub async fn start_up<R: Rng + ?Sized>(
        &self,
        check_reset: bool,
        demo: Option<&mut R>,
    ) -> Result<Option<ResetOutcome>> {
        self.positions.seed_defaults().await?;
        let outcome = if check_reset {
            Some(self.check_and_auto_reset().await?)
        } else {
            None
        };
        if let Some(rng) = demo {
            seed::initialize_demo_payments(&self.payments, rng).await?;
            seed::seed_demo_ledger(&self.ledger, self.clock.as_ref()).await?;
        }
        Ok(outcome)
    }

    /// Delivers what is still queued for publication and stops the publisher.
    pub async fn shutdown(&self) -> PublishStats {
        let stats = self.publisher.close().await;
        info!(
            published = stats.published,
            retried = stats.retried,
            dropped = stats.dropped,
            "Engine shut down"
        );
        stats
    }
}
