//! Monthly payment-cycle reset.
//!
//! The calendar check and the reset itself run as one store call while the
//! scheduler's reset lock is held, so concurrent triggers (periodic loop,
//! startup check, operator) collapse into exactly one reset per month.

use crate::domain::clock::Clock;
use crate::domain::cycle::{PaymentCycleConfig, ResetDay, ResetGate, ResetOutcome};
use crate::domain::ports::{CycleStore, StoreRef};
use crate::error::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct PaymentCycleScheduler {
    store: StoreRef,
    clock: Arc<dyn Clock>,
    reset_lock: Mutex<()>,
}

impl PaymentCycleScheduler {
    pub fn new(store: StoreRef, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            reset_lock: Mutex::new(()),
        }
    }

    /// The cycle configuration, created with defaults on first access.
    pub async fn config(&self) -> Result<PaymentCycleConfig> {
        self.store.load_or_init_cycle_config(self.clock.now()).await
    }

    /// Changes the reset day. Does not trigger a reset by itself.
    pub async fn update_config(&self, reset_day: u32) -> Result<PaymentCycleConfig> {
        let day = ResetDay::new(reset_day)?;
        let config = self.store.set_reset_day(day, self.clock.now()).await?;
        info!(reset_day = day.get(), "Payment cycle reset day updated");
        Ok(config)
    }

    pub async fn next_reset_date(&self) -> Result<NaiveDate> {
        let config = self.config().await?;
        Ok(config.next_reset_date(self.clock.today()))
    }

    /// Resets every paid status if the reset day has been reached this month
    /// and no reset ran yet this month.
    pub async fn check_and_auto_reset(&self) -> Result<ResetOutcome> {
        self.reset(ResetGate::IfDue).await
    }

    /// Operator override: resets regardless of the calendar and stamps today.
    pub async fn manual_reset(&self) -> Result<ResetOutcome> {
        self.reset(ResetGate::Always).await
    }

    async fn reset(&self, gate: ResetGate) -> Result<ResetOutcome> {
        let _guard = self.reset_lock.lock().await;
        let today = self.clock.today();
        let outcome = self
            .store
            .reset_payment_cycle(gate, today, self.clock.now())
            .await?;
        match outcome {
            ResetOutcome::Executed { affected, reset_date } => info!(
                ?gate,
                affected,
                %reset_date,
                "Payment cycle reset"
            ),
            ResetOutcome::NotDue => debug!(%today, "Payment cycle reset not due"),
        }
        Ok(outcome)
    }

    /// Runs [`Self::check_and_auto_reset`] every `every` until `shutdown`
    /// flips. Failures are logged and retried on the next tick.
    pub fn spawn_periodic(
        self: &Arc<Self>,
        every: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.check_and_auto_reset().await {
                            error!(error = %e, "Scheduled payment cycle check failed");
                        }
                    }
                }
            }
            debug!("Payment cycle scheduler stopped");
        })
    }
}
