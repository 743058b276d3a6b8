use super::catalog::PositionService;
use super::ledger::LedgerReconciler;
use super::publisher::OutboundPublisher;
use crate::domain::clock::Clock;
use crate::domain::employee::{PaymentStatus, StatusChange};
use crate::domain::events::OutboundEvent;
use crate::domain::ledger::LedgerEntry;
use crate::domain::money::Salary;
use crate::domain::ports::{PaymentStatusStore, StoreRef};
use crate::error::{PaymentError, Result};
use chrono::Datelike;
use std::sync::Arc;
use tracing::info;

/// Result of a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub status: PaymentStatus,
    pub amount: Salary,
    /// `None` when the salary was zero.
    pub ledger_entry: Option<LedgerEntry>,
}

/// Operator actions on a single employee's payment status.
///
/// Each action commits its state change first; ledger recording follows and
/// outbound events are queued last, so a publishing failure never undoes a
/// committed payment.
pub struct PaymentService {
    store: StoreRef,
    clock: Arc<dyn Clock>,
    positions: Arc<PositionService>,
    ledger: Arc<LedgerReconciler>,
    publisher: Arc<OutboundPublisher>,
}

impl PaymentService {
    pub fn new(
        store: StoreRef,
        clock: Arc<dyn Clock>,
        positions: Arc<PositionService>,
        ledger: Arc<LedgerReconciler>,
        publisher: Arc<OutboundPublisher>,
    ) -> Self {
        Self {
            store,
            clock,
            positions,
            ledger,
            publisher,
        }
    }

    /// Marks an employee paid for the current cycle.
    ///
    /// Confirming an already-paid employee re-stamps `last_payment` and
    /// records another ledger row. The salary is resolved from the position on
    /// the committed row, so amount and position always describe one snapshot.
    pub async fn confirm_payment(&self, employee_id: &str) -> Result<PaymentConfirmation> {
        let now = self.clock.now();
        let status = self
            .store
            .update_status(employee_id, StatusChange::MarkPaid, now)
            .await?
            .ok_or_else(|| PaymentError::not_found("Employee", employee_id))?;
        let amount = self
            .positions
            .salary_for(employee_id, status.position_name.as_deref())
            .await?;
        info!(employee_id, amount = %amount, "Payment confirmed");

        let ledger_entry = self
            .ledger
            .record_employee_payment(
                employee_id,
                amount,
                status.position_name.as_deref(),
                now.date_naive(),
            )
            .await?;

        self.publisher.publish(OutboundEvent::EmployeePaid {
            id: employee_id.to_string(),
            amount: amount.value(),
            position: status.position_name.clone(),
            month: now.month(),
            year: now.year(),
            paid_at: now,
        });
        self.publisher.publish(OutboundEvent::EmployeeStatusChanged {
            id: employee_id.to_string(),
            active: true,
        });

        Ok(PaymentConfirmation {
            status,
            amount,
            ledger_entry,
        })
    }

    /// Operator dismissal: the row stays, `paid` drops to false.
    pub async fn dismiss_employee(&self, employee_id: &str) -> Result<PaymentStatus> {
        let now = self.clock.now();
        let status = self
            .store
            .update_status(employee_id, StatusChange::MarkUnpaid, now)
            .await?
            .ok_or_else(|| PaymentError::not_found("Employee", employee_id))?;
        info!(employee_id, "Employee dismissed");

        self.publisher.publish(OutboundEvent::EmployeeStatusChanged {
            id: employee_id.to_string(),
            active: false,
        });
        self.publisher.publish(OutboundEvent::EmployeeDismissed {
            id: employee_id.to_string(),
            dismissed_at: now,
            position: status.position_name.clone(),
        });
        Ok(status)
    }

    pub async fn statuses(&self) -> Result<Vec<PaymentStatus>> {
        self.store.all_statuses().await
    }

    pub async fn status(&self, employee_id: &str) -> Result<PaymentStatus> {
        self.store
            .get_status(employee_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Employee", employee_id))
    }
}
