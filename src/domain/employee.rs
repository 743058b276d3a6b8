use super::money::Salary;
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_EMPLOYEE_ID_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 100;

/// A catalog entry mapping a position name to its base salary.
///
/// The name is the identity; only the description and salary are editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    pub description: Option<String>,
    pub base_salary: Salary,
}

impl Position {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        base_salary: Salary,
    ) -> Result<Self, PaymentError> {
        let name = name.into();
        validate_text("position name", &name, MAX_NAME_LEN)?;
        Ok(Self {
            name,
            description,
            base_salary,
        })
    }
}

/// A requested mutation of a single payment status row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    AssignPosition(String),
    MarkPaid,
    MarkUnpaid,
}

/// Paid/unpaid state of one employee for the current payment cycle.
///
/// `paid` is only ever set through [`PaymentStatus::apply`], which keeps the
/// `paid => last_payment.is_some()` invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    /// Storage row id, used as the ledger back-reference for payments.
    pub id: u64,
    /// External identity assigned by the employee service.
    pub employee_id: String,
    pub position_name: Option<String>,
    pub paid: bool,
    pub last_payment: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentStatus {
    pub fn new(
        id: u64,
        employee_id: impl Into<String>,
        position_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            employee_id: employee_id.into(),
            position_name,
            paid: false,
            last_payment: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, change: StatusChange, now: DateTime<Utc>) {
        match change {
            StatusChange::AssignPosition(role) => self.position_name = Some(role),
            StatusChange::MarkPaid => {
                self.paid = true;
                self.last_payment = Some(now);
            }
            StatusChange::MarkUnpaid => self.paid = false,
        }
        self.updated_at = now;
    }

    /// Flips a paid status back to unpaid for a new cycle; returns whether
    /// anything changed.
    pub fn reset_for_cycle(&mut self, now: DateTime<Utc>) -> bool {
        if !self.paid {
            return false;
        }
        self.apply(StatusChange::MarkUnpaid, now);
        true
    }
}

pub(crate) fn validate_text(field: &str, value: &str, max_len: usize) -> Result<(), PaymentError> {
    if value.trim().is_empty() {
        return Err(PaymentError::ValidationError(format!(
            "{field} must not be empty"
        )));
    }
    if value.chars().count() > max_len {
        return Err(PaymentError::ValidationError(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(())
}
