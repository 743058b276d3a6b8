//! Lifecycle events exchanged with the message bus.
//!
//! Inbound payloads are loosely shaped JSON produced by the employee service.
//! [`EmployeeEvent::decode`] normalizes the identity field, then deserializes
//! into a strongly typed event; anything that fails is a validation error and
//! is never retried.

use super::employee::{MAX_EMPLOYEE_ID_LEN, MAX_NAME_LEN, validate_text};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CANONICAL_ID_FIELD: &str = "id";
pub const LEGACY_ID_FIELDS: [&str; 2] = ["employeeId", "employee_id"];

pub const EMPLOYEE_PAID_QUEUE: &str = "employee-paid-queue";
pub const EMPLOYEE_DISMISSED_QUEUE: &str = "employee-dismissed-queue";
pub const STATUS_CHANGED_QUEUES: [&str; 2] = [
    "analytics-employee-status-changed-queue",
    "user-employee-status-changed-queue",
];
pub const EXPENSE_REGISTERED_QUEUE: &str = "finance.expense.registered";
pub const EXPENSE_DELETED_QUEUE: &str = "finance.expense.deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Registered,
    Deleted,
    RoleChanged,
    StatusChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Registered,
        EventKind::Deleted,
        EventKind::RoleChanged,
        EventKind::StatusChanged,
    ];

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Registered => "employee.registered",
            Self::Deleted => "employee.deleted",
            Self::RoleChanged => "employee.role_changed",
            Self::StatusChanged => "employee.status_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployeeEvent {
    Registered { id: String, role: String },
    Deleted { id: String },
    RoleChanged { id: String, role: String },
    StatusChanged { id: String, active: bool },
}

#[derive(Deserialize)]
struct IdentityPayload {
    id: String,
}

#[derive(Deserialize)]
struct RolePayload {
    id: String,
    role: String,
}

#[derive(Deserialize)]
struct StatusPayload {
    id: String,
    active: bool,
}

impl EmployeeEvent {
    pub fn decode(kind: EventKind, body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            PaymentError::ValidationError(format!("{}: malformed JSON: {e}", kind.subject()))
        })?;
        let Value::Object(mut fields) = value else {
            return Err(PaymentError::ValidationError(format!(
                "{}: payload must be a JSON object",
                kind.subject()
            )));
        };
        normalize_identity(&mut fields)?;

        let event = match kind {
            EventKind::Registered => {
                let RolePayload { id, role } = parse(kind, fields)?;
                Self::Registered { id, role }
            }
            EventKind::Deleted => {
                let IdentityPayload { id } = parse(kind, fields)?;
                Self::Deleted { id }
            }
            EventKind::RoleChanged => {
                let RolePayload { id, role } = parse(kind, fields)?;
                Self::RoleChanged { id, role }
            }
            EventKind::StatusChanged => {
                let StatusPayload { id, active } = parse(kind, fields)?;
                Self::StatusChanged { id, active }
            }
        };
        event.validate()?;
        Ok(event)
    }

    pub fn employee_id(&self) -> &str {
        match self {
            Self::Registered { id, .. }
            | Self::Deleted { id }
            | Self::RoleChanged { id, .. }
            | Self::StatusChanged { id, .. } => id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Registered { .. } => EventKind::Registered,
            Self::Deleted { .. } => EventKind::Deleted,
            Self::RoleChanged { .. } => EventKind::RoleChanged,
            Self::StatusChanged { .. } => EventKind::StatusChanged,
        }
    }

    fn validate(&self) -> Result<()> {
        validate_text("id", self.employee_id(), MAX_EMPLOYEE_ID_LEN)?;
        if let Self::Registered { role, .. } | Self::RoleChanged { role, .. } = self {
            validate_text("role", role, MAX_NAME_LEN)?;
        }
        Ok(())
    }
}

/// Moves a legacy identity field onto `id`.
///
/// Aliases that agree with each other (or with `id`) are folded away; any
/// disagreement is rejected instead of picking a winner.
pub fn normalize_identity(fields: &mut Map<String, Value>) -> Result<()> {
    let mut identity = fields.remove(CANONICAL_ID_FIELD);
    for alias in LEGACY_ID_FIELDS {
        let Some(value) = fields.remove(alias) else {
            continue;
        };
        match &identity {
            Some(existing) if *existing != value => {
                return Err(PaymentError::ValidationError(format!(
                    "conflicting identity fields: {CANONICAL_ID_FIELD}={existing}, {alias}={value}"
                )));
            }
            Some(_) => {}
            None => identity = Some(value),
        }
    }
    if let Some(id) = identity {
        fields.insert(CANONICAL_ID_FIELD.to_string(), id);
    }
    Ok(())
}

fn parse<T: DeserializeOwned>(kind: EventKind, fields: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| PaymentError::ValidationError(format!("{}: {e}", kind.subject())))
}

/// Messages this service emits after committing a state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundEvent {
    EmployeePaid {
        id: String,
        #[serde(with = "rust_decimal::serde::float")]
        amount: Decimal,
        position: Option<String>,
        month: u32,
        year: i32,
        paid_at: DateTime<Utc>,
    },
    EmployeeDismissed {
        id: String,
        dismissed_at: DateTime<Utc>,
        position: Option<String>,
    },
    EmployeeStatusChanged {
        id: String,
        active: bool,
    },
    ExpenseRegistered {
        #[serde(with = "rust_decimal::serde::float")]
        amount: Decimal,
        category: String,
        description: Option<String>,
        date: NaiveDate,
        responsible: String,
    },
    ExpenseDeleted {
        id: u64,
        deleted_at: DateTime<Utc>,
    },
}

impl OutboundEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::EmployeePaid { .. } => "employee.paid",
            Self::EmployeeDismissed { .. } => "employee.dismissed",
            Self::EmployeeStatusChanged { .. } => "employee.status_changed",
            Self::ExpenseRegistered { .. } => "expense.registered",
            Self::ExpenseDeleted { .. } => "expense.deleted",
        }
    }

    /// Every queue the event is delivered to.
    pub fn queues(&self) -> &'static [&'static str] {
        match self {
            Self::EmployeePaid { .. } => &[EMPLOYEE_PAID_QUEUE],
            Self::EmployeeDismissed { .. } => &[EMPLOYEE_DISMISSED_QUEUE],
            Self::EmployeeStatusChanged { .. } => &STATUS_CHANGED_QUEUES,
            Self::ExpenseRegistered { .. } => &[EXPENSE_REGISTERED_QUEUE],
            Self::ExpenseDeleted { .. } => &[EXPENSE_DELETED_QUEUE],
        }
    }

    /// Wire body. Expense events travel inside a `{type, payload}` envelope.
    pub fn to_body(&self) -> Result<Vec<u8>> {
        let payload = serde_json::to_value(self)?;
        let body = match self {
            Self::ExpenseRegistered { .. } | Self::ExpenseDeleted { .. } => {
                serde_json::json!({ "type": self.subject(), "payload": payload })
            }
            _ => payload,
        };
        Ok(serde_json::to_vec(&body)?)
    }
}
