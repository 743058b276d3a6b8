//! Monthly payment cycle: the reset-day gate and next-reset arithmetic.
//!
//! A month's effective reset day is `min(reset_day, days_in_month)`, so a
//! reset day of 31 still fires on the last day of shorter months.

use crate::error::PaymentError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RESET_DAY: u8 = 10;

/// Day of month (1..=31) on which paid statuses are reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ResetDay(u8);

impl ResetDay {
    pub fn new(day: u32) -> Result<Self, PaymentError> {
        match u8::try_from(day) {
            Ok(day @ 1..=31) => Ok(Self(day)),
            _ => Err(PaymentError::ValidationError(format!(
                "Reset day must be between 1 and 31, got {day}"
            ))),
        }
    }

    pub fn get(&self) -> u32 {
        u32::from(self.0)
    }

    /// The reset day as it applies to a concrete month.
    pub fn effective_in(&self, year: i32, month: u32) -> u32 {
        self.get().min(days_in_month(year, month))
    }
}

impl Default for ResetDay {
    fn default() -> Self {
        Self(DEFAULT_RESET_DAY)
    }
}

impl TryFrom<u32> for ResetDay {
    type Error = PaymentError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResetDay> for u32 {
    fn from(day: ResetDay) -> Self {
        day.get()
    }
}

/// Singleton configuration of the payment cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCycleConfig {
    pub reset_day: ResetDay,
    pub last_reset_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentCycleConfig {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            reset_day: ResetDay::default(),
            last_reset_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a reset is owed on `today`: the reset day has been reached this
    /// month and no reset has been stamped in this month yet.
    pub fn is_reset_due(&self, today: NaiveDate) -> bool {
        let reached = today.day() >= self.reset_day.effective_in(today.year(), today.month());
        let already_this_month = self
            .last_reset_date
            .is_some_and(|last| last.year() == today.year() && last.month() == today.month());
        reached && !already_this_month
    }

    pub fn next_reset_date(&self, today: NaiveDate) -> NaiveDate {
        let this_month = self.reset_day.effective_in(today.year(), today.month());
        if today.day() < this_month {
            return with_day(today.year(), today.month(), this_month);
        }
        let (year, month) = if today.month() == 12 {
            (today.year() + 1, 1)
        } else {
            (today.year(), today.month() + 1)
        };
        with_day(year, month, self.reset_day.effective_in(year, month))
    }

    pub fn set_reset_day(&mut self, day: ResetDay, now: DateTime<Utc>) {
        self.reset_day = day;
        self.updated_at = now;
    }

    pub fn stamp_reset(&mut self, today: NaiveDate, now: DateTime<Utc>) {
        self.last_reset_date = Some(today);
        self.updated_at = now;
    }
}

/// Whether a reset must pass the calendar gate or is an operator override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetGate {
    IfDue,
    Always,
}

/// Result of a reset attempt. `NotDue` is distinct from a reset that ran but
/// found nobody paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResetOutcome {
    NotDue,
    Executed { affected: u64, reset_date: NaiveDate },
}

impl ResetOutcome {
    pub fn affected(&self) -> Option<u64> {
        match self {
            Self::NotDue => None,
            Self::Executed { affected, .. } => Some(*affected),
        }
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

fn with_day(year: i32, month: u32, day: u32) -> NaiveDate {
    // `day` is always clamped to the month length by the callers.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MAX)
}
