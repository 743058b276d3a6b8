use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn paycycle() -> Command {
    let mut cmd = Command::new(cargo_bin!("paycycle"));
    cmd.env_remove("PAYCYCLE_DB_PATH")
        .env_remove("PAYCYCLE_DEMO_SEED")
        .env_remove("PAYCYCLE_TODAY")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_replay_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = paycycle();
    cmd.arg("replay").arg("tests/fixtures/events.jsonl");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "employee_id,position,paid,last_payment,updated_at",
        ))
        .stdout(predicate::str::contains("E1,PERSONAL_TRAINER,false,,"))
        .stdout(predicate::str::contains("E2,CLEANER,false,,"))
        .stdout(predicate::str::contains("E3,RECEPTIONIST,false,,"))
        // Rejected registrations leave no row.
        .stdout(predicate::str::contains("E4").not())
        .stdout(predicate::str::contains("E5").not());

    Ok(())
}

#[test]
fn test_positions_are_seeded() -> Result<(), Box<dyn std::error::Error>> {
    paycycle()
        .arg("positions")
        .assert()
        .success()
        .stdout(predicate::str::contains("name,base_salary,description"))
        .stdout(predicate::str::contains("MANAGER,0,"))
        .stdout(predicate::str::contains("PERSONAL_TRAINER,3500,"))
        .stdout(predicate::str::contains("RECEPTIONIST,1800,"))
        .stdout(predicate::str::contains("CLEANER,1400,"));

    Ok(())
}

#[test]
fn test_reset_day_out_of_range_fails() -> Result<(), Box<dyn std::error::Error>> {
    paycycle()
        .args(["set-reset-day", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Reset day"));

    paycycle()
        .args(["set-reset-day", "31"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reset_day,last_reset_date,next_reset_date"))
        .stdout(predicate::str::starts_with("reset_day").and(predicate::str::contains("\n31,")));

    Ok(())
}

#[test]
fn test_empty_reports_still_have_headers() -> Result<(), Box<dyn std::error::Error>> {
    paycycle()
        .arg("ledger")
        .assert()
        .success()
        .stdout("id,expense_date,source_kind,source_ref,amount,description\n");

    paycycle()
        .arg("status")
        .assert()
        .success()
        .stdout("employee_id,position,paid,last_payment,updated_at\n");

    Ok(())
}

#[test]
fn test_check_reset_reports_the_reset_it_runs() -> Result<(), Box<dyn std::error::Error>> {
    paycycle()
        .args(["--today", "2026-10-19", "check-reset"])
        .assert()
        .success()
        .stdout("outcome,affected,reset_date\nexecuted,0,2026-10-19\n");

    paycycle()
        .args(["--today", "2026-10-09", "check-reset"])
        .assert()
        .success()
        .stdout("outcome,affected,reset_date\nnot_due,,\n");

    Ok(())
}

#[test]
fn test_expense_add_prints_the_new_expense() -> Result<(), Box<dyn std::error::Error>> {
    paycycle()
        .args(["expense-add", "Rent", "2000.00", "--responsible", "Ana"])
        .args(["--date", "2025-08-01", "--description", "August"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "id,date,category,value,responsible,description",
        ))
        .stdout(predicate::str::contains("1,2025-08-01,Rent,2000,Ana,August"));

    paycycle()
        .args(["expense-add", "Rent", "-5", "--responsible", "Ana"])
        .assert()
        .failure();

    Ok(())
}

#[test]
fn test_unknown_employee_payment_fails() -> Result<(), Box<dyn std::error::Error>> {
    paycycle()
        .args(["pay", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));

    Ok(())
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_db_path_without_rocksdb_falls_back() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    paycycle()
        .arg("--db-path")
        .arg(dir.path().join("db"))
        .arg("status")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Built without storage-rocksdb, falling back to in-memory storage",
        ));

    Ok(())
}
