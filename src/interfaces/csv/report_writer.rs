use crate::application::payments::PaymentConfirmation;
use crate::domain::cycle::{PaymentCycleConfig, ResetOutcome};
use crate::domain::employee::{PaymentStatus, Position};
use crate::domain::ledger::{LedgerEntry, ManualExpense};
use crate::error::Result;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct StatusRow<'a> {
    employee_id: &'a str,
    position: Option<&'a str>,
    paid: bool,
    last_payment: Option<String>,
    updated_at: String,
}

#[derive(Serialize)]
struct PaymentRow<'a> {
    employee_id: &'a str,
    position: Option<&'a str>,
    amount: String,
    paid: bool,
    ledger_entry: Option<u64>,
}

#[derive(Serialize)]
struct PositionRow<'a> {
    name: &'a str,
    base_salary: String,
    description: Option<&'a str>,
}

#[derive(Serialize)]
struct LedgerRow<'a> {
    id: u64,
    expense_date: NaiveDate,
    source_kind: &'a str,
    source_ref: Option<u64>,
    amount: String,
    description: &'a str,
}

#[derive(Serialize)]
struct ExpenseRow<'a> {
    id: u64,
    date: NaiveDate,
    category: &'a str,
    value: String,
    responsible: &'a str,
    description: Option<&'a str>,
}

#[derive(Serialize)]
struct CycleRow {
    reset_day: u32,
    last_reset_date: Option<NaiveDate>,
    next_reset_date: NaiveDate,
}

#[derive(Serialize)]
struct ResetRow {
    outcome: &'static str,
    affected: Option<u64>,
    reset_date: Option<NaiveDate>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Writes command results as CSV with a header row.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_statuses(&mut self, statuses: &[PaymentStatus]) -> Result<()> {
        for status in statuses {
            self.writer.serialize(StatusRow {
                employee_id: &status.employee_id,
                position: status.position_name.as_deref(),
                paid: status.paid,
                last_payment: status.last_payment.map(timestamp),
                updated_at: timestamp(status.updated_at),
            })?;
        }
        self.finish(statuses.is_empty(), &["employee_id", "position", "paid", "last_payment", "updated_at"])
    }

    pub fn write_payment(&mut self, confirmation: &PaymentConfirmation) -> Result<()> {
        self.writer.serialize(PaymentRow {
            employee_id: &confirmation.status.employee_id,
            position: confirmation.status.position_name.as_deref(),
            amount: confirmation.amount.to_string(),
            paid: confirmation.status.paid,
            ledger_entry: confirmation.ledger_entry.as_ref().map(|e| e.id),
        })?;
        self.finish(false, &[])
    }

    pub fn write_positions(&mut self, positions: &[Position]) -> Result<()> {
        for position in positions {
            self.writer.serialize(PositionRow {
                name: &position.name,
                base_salary: position.base_salary.to_string(),
                description: position.description.as_deref(),
            })?;
        }
        self.finish(positions.is_empty(), &["name", "base_salary", "description"])
    }

    pub fn write_ledger(&mut self, entries: &[LedgerEntry]) -> Result<()> {
        for entry in entries {
            self.writer.serialize(LedgerRow {
                id: entry.id,
                expense_date: entry.expense_date,
                source_kind: entry.source_kind.as_str(),
                source_ref: entry.source_ref,
                amount: entry.amount.to_string(),
                description: &entry.description,
            })?;
        }
        self.finish(
            entries.is_empty(),
            &["id", "expense_date", "source_kind", "source_ref", "amount", "description"],
        )
    }

    pub fn write_expenses(&mut self, expenses: &[ManualExpense]) -> Result<()> {
        for expense in expenses {
            self.writer.serialize(ExpenseRow {
                id: expense.id,
                date: expense.date,
                category: &expense.category,
                value: expense.value.to_string(),
                responsible: &expense.responsible,
                description: expense.description.as_deref(),
            })?;
        }
        self.finish(
            expenses.is_empty(),
            &["id", "date", "category", "value", "responsible", "description"],
        )
    }

    pub fn write_cycle(&mut self, config: &PaymentCycleConfig, next_reset: NaiveDate) -> Result<()> {
        self.writer.serialize(CycleRow {
            reset_day: config.reset_day.get(),
            last_reset_date: config.last_reset_date,
            next_reset_date: next_reset,
        })?;
        self.finish(false, &[])
    }

    pub fn write_reset(&mut self, outcome: &ResetOutcome) -> Result<()> {
        let row = match outcome {
            ResetOutcome::NotDue => ResetRow {
                outcome: "not_due",
                affected: None,
                reset_date: None,
            },
            ResetOutcome::Executed { affected, reset_date } => ResetRow {
                outcome: "executed",
                affected: Some(*affected),
                reset_date: Some(*reset_date),
            },
        };
        self.writer.serialize(row)?;
        self.finish(false, &[])
    }

    /// Serde only emits a header with the first row; empty reports get an
    /// explicit one.
    fn finish(&mut self, empty: bool, header: &[&str]) -> Result<()> {
        if empty {
            self.writer.write_record(header)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
