mod common;

use chrono::NaiveDate;
use common::{harness, paid_count, register};
use paycycle::domain::cycle::ResetOutcome;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_reset_runs_once_per_month_across_a_quarter() {
    let h = harness(2025, 3, 1).await;
    for id in ["E1", "E2", "E3"] {
        register(&h.engine, id, "CLEANER").await;
    }

    let mut resets = Vec::new();
    for month in 3..=5 {
        for day in [1, 9, 10, 11, 20, 28] {
            h.clock.set_date(2025, month, day);
            // Everybody gets paid early in the month.
            if day == 1 {
                for id in ["E1", "E2", "E3"] {
                    h.engine.confirm_payment(id).await.unwrap();
                }
            }
            if let ResetOutcome::Executed { affected, reset_date } =
                h.engine.check_and_auto_reset().await.unwrap()
            {
                resets.push((reset_date, affected));
            }
        }
    }

    assert_eq!(
        resets,
        vec![
            (date(2025, 3, 10), 3),
            (date(2025, 4, 10), 3),
            (date(2025, 5, 10), 3),
        ]
    );
    assert_eq!(paid_count(&h.engine).await, 0);
}

#[tokio::test]
async fn test_missed_reset_day_catches_up_later_in_month() {
    let h = harness(2025, 3, 10).await;
    register(&h.engine, "E1", "CLEANER").await;
    h.engine.check_and_auto_reset().await.unwrap();

    h.engine.confirm_payment("E1").await.unwrap();
    h.clock.set_date(2025, 3, 15);
    assert_eq!(h.engine.check_and_auto_reset().await.unwrap(), ResetOutcome::NotDue);
    assert_eq!(paid_count(&h.engine).await, 1);

    // The process was down on April 10th.
    h.clock.set_date(2025, 4, 11);
    let outcome = h.engine.check_and_auto_reset().await.unwrap();
    assert_eq!(
        outcome,
        ResetOutcome::Executed {
            affected: 1,
            reset_date: date(2025, 4, 11)
        }
    );
}

#[tokio::test]
async fn test_reset_day_31_clamps_to_february_end() {
    let h = harness(2024, 2, 1).await;
    h.engine.update_cycle_config(31).await.unwrap();
    assert_eq!(h.engine.next_reset_date().await.unwrap(), date(2024, 2, 29));

    register(&h.engine, "E1", "CLEANER").await;
    h.engine.confirm_payment("E1").await.unwrap();

    h.clock.set_date(2024, 2, 28);
    assert_eq!(h.engine.check_and_auto_reset().await.unwrap(), ResetOutcome::NotDue);
    h.clock.set_date(2024, 2, 29);
    assert_eq!(h.engine.check_and_auto_reset().await.unwrap().affected(), Some(1));
    assert_eq!(h.engine.next_reset_date().await.unwrap(), date(2024, 3, 31));
}

#[tokio::test]
async fn test_next_reset_date_rolls_over_year() {
    let h = harness(2025, 12, 15).await;
    assert_eq!(h.engine.next_reset_date().await.unwrap(), date(2026, 1, 10));

    h.clock.set_date(2025, 12, 9);
    assert_eq!(h.engine.next_reset_date().await.unwrap(), date(2025, 12, 10));
}

#[tokio::test]
async fn test_config_is_created_once_with_default_day() {
    let h = harness(2025, 6, 1).await;
    let first = h.engine.get_or_create_cycle_config().await.unwrap();
    let second = h.engine.get_or_create_cycle_config().await.unwrap();
    assert_eq!(first.reset_day.get(), 10);
    assert_eq!(first.last_reset_date, None);
    assert_eq!(first.created_at, second.created_at);

    assert!(h.engine.update_cycle_config(0).await.is_err());
    assert_eq!(h.engine.get_or_create_cycle_config().await.unwrap().reset_day.get(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks_and_payments_never_double_reset() {
    let h = Arc::new(harness(2025, 6, 12).await);
    for i in 0..20 {
        register(&h.engine, &format!("E{i}"), "RECEPTIONIST").await;
        h.engine.confirm_payment(&format!("E{i}")).await.unwrap();
    }

    let mut checks = Vec::new();
    for _ in 0..8 {
        let h = Arc::clone(&h);
        checks.push(tokio::spawn(async move {
            h.engine.check_and_auto_reset().await.unwrap()
        }));
    }
    let mut payments = Vec::new();
    for i in 0..20 {
        let h = Arc::clone(&h);
        payments.push(tokio::spawn(async move {
            h.engine.confirm_payment(&format!("E{i}")).await.unwrap()
        }));
    }

    let mut executed = Vec::new();
    for check in checks {
        if let Some(affected) = check.await.unwrap().affected() {
            executed.push(affected);
        }
    }
    for payment in payments {
        assert!(payment.await.unwrap().status.paid);
    }

    // Everyone was paid when the single reset ran.
    assert_eq!(executed, vec![20]);
    assert_eq!(h.engine.check_and_auto_reset().await.unwrap(), ResetOutcome::NotDue);
}

#[tokio::test]
async fn test_manual_reset_keeps_payment_history() {
    let h = harness(2025, 6, 2).await;
    register(&h.engine, "E1", "PERSONAL_TRAINER").await;
    h.engine.confirm_payment("E1").await.unwrap();

    let outcome = h.engine.manual_reset().await.unwrap();
    assert_eq!(outcome.affected(), Some(1));
    assert_eq!(paid_count(&h.engine).await, 0);
    // Payment history is permanent.
    assert_eq!(h.engine.list_ledger(10, 0).await.unwrap().len(), 1);
}
