use crate::domain::clock::Clock;
use crate::domain::employee::StatusChange;
use crate::domain::events::EmployeeEvent;
use crate::domain::ports::{PaymentStatusStore, StoreRef};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// What applying an inbound event did to the payment status store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Registered,
    AlreadyRegistered,
    Removed,
    AlreadyAbsent,
    PositionUpdated,
    /// Role change for an employee we have no row for; dropped.
    UnknownEmployee,
    /// Accepted without touching payment state.
    Ignored,
}

/// Applies employee lifecycle events to the payment status store.
///
/// Every handler is idempotent and tolerates being run before the events it
/// logically follows, so redelivery and reordering by the bus never corrupt
/// state. Handlers write only local state; they publish nothing.
pub struct EventIngestor {
    store: StoreRef,
    clock: Arc<dyn Clock>,
}

impl EventIngestor {
    pub fn new(store: StoreRef, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn apply(&self, event: EmployeeEvent) -> Result<IngestOutcome> {
        let now = self.clock.now();
        let outcome = match &event {
            EmployeeEvent::Registered { id, role } => {
                let inserted = self
                    .store
                    .insert_status_if_absent(id, Some(role.as_str()), now)
                    .await?;
                match inserted {
                    Some(_) => {
                        info!(employee_id = %id, role = %role, "Created payment status");
                        IngestOutcome::Registered
                    }
                    None => {
                        info!(employee_id = %id, "Employee already registered");
                        IngestOutcome::AlreadyRegistered
                    }
                }
            }
            EmployeeEvent::Deleted { id } => {
                if self.store.remove_status(id).await? {
                    info!(employee_id = %id, "Deleted payment status");
                    IngestOutcome::Removed
                } else {
                    debug!(employee_id = %id, "Payment status already absent");
                    IngestOutcome::AlreadyAbsent
                }
            }
            EmployeeEvent::RoleChanged { id, role } => {
                let change = StatusChange::AssignPosition(role.clone());
                match self.store.update_status(id, change, now).await? {
                    Some(_) => {
                        info!(employee_id = %id, role = %role, "Updated employee position");
                        IngestOutcome::PositionUpdated
                    }
                    None => {
                        info!(employee_id = %id, "Employee not found for role update");
                        IngestOutcome::UnknownEmployee
                    }
                }
            }
            EmployeeEvent::StatusChanged { id, active } => {
                debug!(employee_id = %id, active, "Status change carries no payment state");
                IngestOutcome::Ignored
            }
        };
        Ok(outcome)
    }
}
