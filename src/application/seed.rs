//! Environment bootstrap. Nothing here runs as part of the reset cycle.

use super::ledger::LedgerReconciler;
use super::payments::PaymentService;
use crate::domain::clock::Clock;
use crate::domain::ledger::{NewLedgerEntry, SourceKind};
use crate::domain::money::Amount;
use crate::error::Result;
use chrono::{Duration, NaiveDate};
use rand::Rng;
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

/// Ledger rows are seeded only while the ledger holds fewer than this.
pub const DEMO_LEDGER_THRESHOLD: usize = 10;

const DEMO_EXPENSES: [(&str, SourceKind, Decimal, i64); 10] = [
    ("Treadmill belt replacement", SourceKind::Equipment, dec!(850.00), 2),
    ("Air conditioning service", SourceKind::Maintenance, dec!(420.00), 5),
    ("Electricity bill", SourceKind::Utilities, dec!(1275.40), 7),
    ("Water bill", SourceKind::Utilities, dec!(310.15), 7),
    ("Locker room deep clean", SourceKind::Cleaning, dec!(260.00), 9),
    ("Protein bar restock", SourceKind::Inventory, dec!(540.00), 12),
    ("Social media campaign", SourceKind::Marketing, dec!(600.00), 15),
    ("Towels and disinfectant", SourceKind::Supplies, dec!(185.90), 18),
    ("Dumbbell set", SourceKind::Equipment, dec!(1320.00), 21),
    ("Payroll advance", SourceKind::EmployeePayment, dec!(900.00), 25),
];

/// How many of `unpaid` employees the demo seed pays: half, rounded up.
pub fn demo_share(unpaid: usize) -> usize {
    unpaid.div_ceil(2)
}

/// Confirms payment for a random half (rounded up) of the unpaid employees,
/// through the normal confirmation path. Returns the ids that were paid.
pub async fn initialize_demo_payments<R: Rng + ?Sized>(
    payments: &PaymentService,
    rng: &mut R,
) -> Result<Vec<String>> {
    let mut unpaid: Vec<String> = payments
        .statuses()
        .await?
        .into_iter()
        .filter(|s| !s.paid)
        .map(|s| s.employee_id)
        .collect();
    if unpaid.is_empty() {
        info!("No unpaid employees, demo payments skipped");
        return Ok(Vec::new());
    }

    unpaid.shuffle(rng);
    unpaid.truncate(demo_share(unpaid.len()));
    let mut paid = Vec::with_capacity(unpaid.len());
    for employee_id in unpaid {
        match payments.confirm_payment(&employee_id).await {
            Ok(_) => paid.push(employee_id),
            // The row may have been deleted since the listing.
            Err(e) if e.is_client_error() => {
                warn!(employee_id = %employee_id, error = %e, "Skipping demo payment")
            }
            Err(e) => return Err(e),
        }
    }
    info!(count = paid.len(), "Demo payments initialized");
    Ok(paid)
}

/// Fills a sparse ledger with sample operating expenses dated in the last
/// month. Returns the number of rows added.
pub async fn seed_demo_ledger(ledger: &LedgerReconciler, clock: &dyn Clock) -> Result<usize> {
    let existing = ledger.count().await?;
    if existing >= DEMO_LEDGER_THRESHOLD {
        return Ok(0);
    }
    let today = clock.today();
    for (description, kind, amount, days_ago) in DEMO_EXPENSES {
        ledger
            .append(NewLedgerEntry {
                description: description.to_string(),
                amount: Amount::new(amount)?,
                expense_date: days_back(today, days_ago),
                source_kind: kind,
                source_ref: None,
            })
            .await?;
    }
    info!(added = DEMO_EXPENSES.len(), "Seeded demo ledger rows");
    Ok(DEMO_EXPENSES.len())
}

fn days_back(today: NaiveDate, days: i64) -> NaiveDate {
    today.checked_sub_signed(Duration::days(days)).unwrap_or(today)
}
