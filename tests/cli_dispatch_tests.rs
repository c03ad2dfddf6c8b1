use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_norp-ingest")
}

fn run(processed: &Path, args: &[&str]) -> Output {
    Command::new(bin())
        .args(args)
        .arg("--processed-dir")
        .arg(processed)
        .env_remove("RUST_LOG")
        .env_remove("NORP_PROCESSED_DIR")
        .output()
        .expect("norp-ingest should run")
}

fn write_csv(dir: &Path) -> String {
    let path = dir.join("orgs.csv");
    fs::write(&path, "Tax Year,State,Total Revenue\n2020,TX,10\n2021,,20\n")
        .expect("fixture should be written");
    path.to_string_lossy().into_owned()
}

#[test]
fn ingest_command_registers_dataset_and_exits_zero() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();
    let source = write_csv(raw.path());

    let output = run(processed.path(), &["--file", &source, "--name", "orgs"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ingestion complete: dataset='orgs', rows=2, columns=3"));
    assert!(processed.path().join("registry.json").exists());
    assert!(processed.path().join("orgs_profile.json").exists());
}

#[test]
fn list_and_show_print_catalog_json() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();
    let source = write_csv(raw.path());
    assert_eq!(
        run(processed.path(), &["-f", &source, "-n", "orgs"]).status.code(),
        Some(0)
    );

    let output = run(processed.path(), &["list"]);
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("list should emit json");
    assert_eq!(payload[0]["name"], "orgs");
    assert_eq!(payload[0]["row_count"], 2);

    let output = run(processed.path(), &["show", "orgs"]);
    assert_eq!(output.status.code(), Some(0));
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("show should emit json");
    assert_eq!(payload["column_names"][0], "tax_year");

    let output = run(processed.path(), &["show", "missing"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn missing_arguments_are_a_usage_error() {
    let processed = TempDir::new().unwrap();
    let output = run(processed.path(), &["--file", "whatever.csv"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--name"));
}

#[test]
fn failed_ingestion_logs_error_kind_and_exits_one() {
    let raw = TempDir::new().unwrap();
    let processed = TempDir::new().unwrap();
    let path = raw.path().join("empty.csv");
    fs::write(&path, "Tax Year,State\n").unwrap();

    let output = run(
        processed.path(),
        &["--file", path.to_string_lossy().as_ref(), "--name", "empty"],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("empty_dataset"));
    assert!(!processed.path().join("registry.json").exists());
}
