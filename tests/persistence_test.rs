#![cfg(feature = "storage-rocksdb")]

mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(db_path: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(cargo_bin!("paycycle"));
    cmd.env_remove("PAYCYCLE_DEMO_SEED")
        .env_remove("PAYCYCLE_TODAY")
        .arg("--db-path")
        .arg(db_path)
        .args(args);
    let output = cmd.output().expect("Failed to execute command");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let events = dir.path().join("events.jsonl");
    common::write_event_log(
        &events,
        &[(
            "fincance-cadastro-funcionario-queue",
            json!({"id": "E1", "role": "PERSONAL_TRAINER"}),
        )],
    )
    .unwrap();

    // 1. First run: register the employee
    let first = run(&db_path, &["replay", events.to_str().unwrap()]);
    assert!(stdout(&first).contains("E1,PERSONAL_TRAINER,false,,"));

    // 2. Second run: pay them
    let second = run(&db_path, &["pay", "E1"]);
    assert!(stdout(&second).contains("E1,PERSONAL_TRAINER,3500,true,"));

    // 3. Third run: status and ledger come back from disk
    let third = run(&db_path, &["status"]);
    assert!(stdout(&third).contains("E1,PERSONAL_TRAINER,true,"));
    let ledger = run(&db_path, &["ledger"]);
    assert!(stdout(&ledger).contains(",employee_payment,"));
}

#[test]
fn test_manual_expenses_survive_restarts() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    run(
        &db_path,
        &["expense-add", "Rent", "2000", "--responsible", "Ana", "--date", "2025-08-01"],
    );
    run(
        &db_path,
        &["expense-add", "Water", "80.5", "--responsible", "Ana", "--date", "2025-08-03"],
    );
    run(&db_path, &["expense-delete", "1"]);

    let expenses = stdout(&run(&db_path, &["expenses"]));
    assert!(expenses.contains("2,2025-08-03,Water,80.5,Ana,"));
    assert!(!expenses.contains("Rent"));

    // Ids keep counting after a restart.
    let added = stdout(&run(
        &db_path,
        &["expense-add", "Gas", "40", "--responsible", "Ana", "--date", "2025-08-04"],
    ));
    assert!(added.contains("3,2025-08-04,Gas,40,Ana,"));
}

#[test]
fn test_check_reset_reports_employees_paid_before_the_reset_day() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let events = dir.path().join("events.jsonl");
    common::write_event_log(
        &events,
        &[(
            "fincance-cadastro-funcionario-queue",
            json!({"id": "E1", "role": "CLEANER"}),
        )],
    )
    .unwrap();

    run(&db_path, &["--today", "2026-10-05", "replay", events.to_str().unwrap()]);
    run(&db_path, &["--today", "2026-10-05", "pay", "E1"]);

    let reset = stdout(&run(&db_path, &["--today", "2026-10-19", "check-reset"]));
    assert_eq!(reset, "outcome,affected,reset_date\nexecuted,1,2026-10-19\n");

    let status = stdout(&run(&db_path, &["--today", "2026-10-19", "status"]));
    assert!(status.contains("E1,CLEANER,false,"));

    let again = stdout(&run(&db_path, &["--today", "2026-10-20", "check-reset"]));
    assert_eq!(again, "outcome,affected,reset_date\nnot_due,,\n");
}

#[test]
fn test_rocksdb_no_fallback_warning() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut cmd = Command::new(cargo_bin!("paycycle"));
    cmd.arg("--db-path").arg(&db_path).arg("status");

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("falling back").not());
}
