use super::employee::{MAX_NAME_LEN, validate_text};
use super::money::Amount;
use crate::error::PaymentError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Origin of a ledger row.
///
/// `Manual` rows mirror a live manual expense one-to-one; `EmployeePayment`
/// rows are permanent payment history. The remaining kinds are free-standing
/// operating expenses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SourceKind {
    Manual,
    EmployeePayment,
    Equipment,
    Maintenance,
    Utilities,
    Cleaning,
    Inventory,
    Marketing,
    Supplies,
    Other(String),
}

impl SourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Manual => "manual",
            Self::EmployeePayment => "employee_payment",
            Self::Equipment => "equipment",
            Self::Maintenance => "maintenance",
            Self::Utilities => "utilities",
            Self::Cleaning => "cleaning",
            Self::Inventory => "inventory",
            Self::Marketing => "marketing",
            Self::Supplies => "supplies",
            Self::Other(kind) => kind,
        }
    }
}

impl FromStr for SourceKind {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "manual" => Self::Manual,
            "employee_payment" => Self::EmployeePayment,
            "equipment" => Self::Equipment,
            "maintenance" => Self::Maintenance,
            "utilities" => Self::Utilities,
            "cleaning" => Self::Cleaning,
            "inventory" => Self::Inventory,
            "marketing" => Self::Marketing,
            "supplies" => Self::Supplies,
            other => {
                validate_text("source kind", other, 50)?;
                Self::Other(other.to_string())
            }
        };
        Ok(kind)
    }
}

impl TryFrom<String> for SourceKind {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the unified expense view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: u64,
    pub description: String,
    pub amount: Amount,
    pub expense_date: NaiveDate,
    pub source_kind: SourceKind,
    /// Id of the originating row in the source table, when there is one.
    pub source_ref: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub description: String,
    pub amount: Amount,
    pub expense_date: NaiveDate,
    pub source_kind: SourceKind,
    pub source_ref: Option<u64>,
}

impl NewLedgerEntry {
    pub fn for_manual_expense(expense: &ManualExpense) -> Self {
        let mut description = format!("Manual expense - {}", expense.category);
        if let Some(detail) = expense.description.as_deref().filter(|d| !d.is_empty()) {
            description.push_str(": ");
            description.push_str(detail);
        }
        Self {
            description,
            amount: expense.value,
            expense_date: expense.date,
            source_kind: SourceKind::Manual,
            source_ref: Some(expense.id),
        }
    }

    pub fn for_employee_payment(
        employee_id: &str,
        amount: Amount,
        position_name: Option<&str>,
        date: NaiveDate,
        status_id: Option<u64>,
    ) -> Self {
        let description = match position_name {
            Some(position) => format!("Employee payment - {employee_id} ({position})"),
            None => format!("Employee payment - {employee_id}"),
        };
        Self {
            description,
            amount,
            expense_date: date,
            source_kind: SourceKind::EmployeePayment,
            source_ref: status_id,
        }
    }

    pub fn into_entry(self, id: u64, now: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            description: self.description,
            amount: self.amount,
            expense_date: self.expense_date,
            source_kind: self.source_kind,
            source_ref: self.source_ref,
            created_at: now,
        }
    }
}

/// An operator-entered expense; each live one has exactly one `Manual`
/// ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualExpense {
    pub id: u64,
    pub date: NaiveDate,
    pub category: String,
    pub description: Option<String>,
    pub value: Amount,
    pub responsible: String,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new manual expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewManualExpense {
    pub date: NaiveDate,
    pub category: String,
    pub description: Option<String>,
    pub value: Amount,
    pub responsible: String,
}

impl NewManualExpense {
    pub fn new(
        date: NaiveDate,
        category: impl Into<String>,
        description: Option<String>,
        value: rust_decimal::Decimal,
        responsible: impl Into<String>,
    ) -> Result<Self, PaymentError> {
        let category = category.into();
        let responsible = responsible.into();
        validate_text("category", &category, MAX_NAME_LEN)?;
        validate_text("responsible", &responsible, MAX_NAME_LEN)?;
        Ok(Self {
            date,
            category,
            description,
            value: Amount::new(value)?,
            responsible,
        })
    }

    pub fn into_expense(self, id: u64, now: DateTime<Utc>) -> ManualExpense {
        ManualExpense {
            id,
            date: self.date,
            category: self.category,
            description: self.description,
            value: self.value,
            responsible: self.responsible,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// Orders a snapshot by expense date, newest first, insertion order on
    /// ties, and cuts the requested window out of it.
    pub fn apply(&self, mut entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
        entries.sort_by(|a, b| b.expense_date.cmp(&a.expense_date).then(a.id.cmp(&b.id)));
        entries
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, 0)
    }
}
