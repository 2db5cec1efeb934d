use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const STATEMENT: &str = "\
Date,Description,Amount
01/31/2025,ACME CORP PAYROLL,1000.00
01/05/2025,RENT PAYMENT,-400.00
";

const FINWISE_VARS: &[&str] = &[
    "FINWISE_API_KEY",
    "FINWISE_AUTH_DOMAIN",
    "FINWISE_PROJECT_ID",
    "FINWISE_STORAGE_BUCKET",
    "FINWISE_MESSAGING_SENDER_ID",
    "FINWISE_APP_ID",
    "FINWISE_EXTRACTOR_URL",
    "FINWISE_LOG",
];

fn finwise(home: &Path, configured: bool) -> Command {
    let mut cmd = Command::cargo_bin("finwise").unwrap();
    cmd.current_dir(home).env("HOME", home).env("NO_COLOR", "1");
    for var in FINWISE_VARS {
        cmd.env_remove(var);
    }
    if configured {
        cmd.env("FINWISE_API_KEY", "test-key")
            .env("FINWISE_PROJECT_ID", "finwise-test");
    }
    cmd
}

fn init(home: &TempDir) {
    let data_dir = home.path().join("data");
    finwise(home.path(), false)
        .args(["init", "--data-dir"])
        .arg(&data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized finwise"));
}

fn register(home: &TempDir) {
    finwise(home.path(), true)
        .args([
            "register",
            "--first-name",
            "Ada",
            "--last-name",
            "Lovelace",
            "--email",
            "ada@example.com",
            "--password-stdin",
        ])
        .write_stdin("secret123\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada Lovelace"));
}

#[test]
fn status_without_config_reports_services_unavailable() {
    let home = TempDir::new().unwrap();
    finwise(home.path(), false)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("services unavailable"));
}

#[test]
fn commands_without_config_exit_cleanly() {
    let home = TempDir::new().unwrap();
    finwise(home.path(), false)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Backend services unavailable"));
    assert!(!home.path().join(".local/share/finwise").exists());
}

#[test]
fn dotenv_file_supplies_backend_config() {
    let home = TempDir::new().unwrap();
    init(&home);
    std::fs::write(
        home.path().join(".env"),
        "FINWISE_API_KEY=from-dotenv\nFINWISE_PROJECT_ID=dotenv-project\n",
    )
    .unwrap();
    finwise(home.path(), false)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("dotenv-project"))
        .stdout(predicate::str::contains("not signed in"));
}

#[test]
fn register_upload_and_review_history() {
    let home = TempDir::new().unwrap();
    init(&home);
    register(&home);

    let cookie = home.path().join("data/cookies/token");
    let content = std::fs::read_to_string(&cookie).unwrap();
    assert!(content.starts_with("token="));
    assert!(content.contains("SameSite=Strict"));

    let statement = home.path().join("jan.csv");
    std::fs::write(&statement, STATEMENT).unwrap();
    finwise(home.path(), true)
        .arg("upload")
        .arg(&statement)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 transactions extracted"))
        .stdout(predicate::str::contains("Total Balance"))
        .stdout(predicate::str::contains("$600.00"))
        .stdout(predicate::str::contains("60.0%"));

    finwise(home.path(), true)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("jan.csv"));

    finwise(home.path(), true)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("signed in as Ada Lovelace"));

    finwise(home.path(), true).arg("logout").assert().success();
    assert!(!cookie.exists());

    finwise(home.path(), true)
        .arg("history")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn login_with_wrong_password_fails() {
    let home = TempDir::new().unwrap();
    init(&home);
    register(&home);
    finwise(home.path(), true).arg("logout").assert().success();

    finwise(home.path(), true)
        .args(["login", "--email", "ada@example.com", "--password-stdin"])
        .write_stdin("not-the-password\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));

    finwise(home.path(), true)
        .args(["login", "--email", "ada@example.com", "--password-stdin"])
        .write_stdin("secret123\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as"));
}

#[test]
fn profile_edit_and_manual_transactions() {
    let home = TempDir::new().unwrap();
    init(&home);
    register(&home);

    finwise(home.path(), true)
        .args(["profile", "edit", "--city", "London", "--phone", "555-0100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile updated"));
    finwise(home.path(), true)
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("London"))
        .stdout(predicate::str::contains("555-0100"));

    finwise(home.path(), true)
        .args([
            "transactions",
            "add",
            "expense",
            "12.50",
            "--category",
            "food",
            "--date",
            "2025-03-01",
            "--description",
            "Lunch",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added expense $12.50 (Food)"));
    finwise(home.path(), true)
        .args(["transactions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lunch"));

    finwise(home.path(), true)
        .args(["transactions", "add", "expense", "5", "--category", "Lottery"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown category"));
}

#[test]
fn unsupported_statement_type_is_rejected() {
    let home = TempDir::new().unwrap();
    init(&home);
    register(&home);
    let statement = home.path().join("jan.xlsx");
    std::fs::write(&statement, "not a statement").unwrap();
    finwise(home.path(), true)
        .arg("upload")
        .arg(&statement)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file"));
}
