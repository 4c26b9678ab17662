//! Tests for the csv2xlsx binary

mod common;

use assert_cmd::Command;
use calamine::Data;
use common::{read_workbook, text, write_source};
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn files_matching(dir: &TempDir, prefix: &str, suffix: &str) -> Vec<PathBuf> {
    fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with(prefix) && name.ends_with(suffix)
        })
        .collect()
}

#[test]
fn test_cli_converts_into_working_directory() {
    let dir = TempDir::new().unwrap();
    write_source(&dir, "data.csv", "name,qty\nbolt,40\n");

    Command::cargo_bin("csv2xlsx")
        .unwrap()
        .current_dir(dir.path())
        .args(["-i", "data", "-d", ",", "-o", "report"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 row(s)"));

    let outputs = files_matching(&dir, "report ", ".xlsx");
    assert_eq!(outputs.len(), 1, "one dated workbook expected");

    let (sheets, rows) = read_workbook(&outputs[0]);
    assert_eq!(sheets, vec!["report".to_string()]);
    assert_eq!(rows[1], vec![text("bolt"), Data::Float(40.0)]);

    let logs = files_matching(&dir, "debug ", ".txt");
    assert_eq!(logs.len(), 1, "one debug log expected");
}

#[test]
fn test_cli_long_options() {
    let dir = TempDir::new().unwrap();
    write_source(&dir, "data.csv", "a;b\n");

    Command::cargo_bin("csv2xlsx")
        .unwrap()
        .current_dir(dir.path())
        .args(["--input", "data.csv", "--delimeter", ";", "--output", "out.xlsx"])
        .assert()
        .success();

    assert_eq!(files_matching(&dir, "out ", ".xlsx").len(), 1);
}

#[test]
fn test_cli_missing_source_fails() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("csv2xlsx")
        .unwrap()
        .current_dir(dir.path())
        .args(["-i", "absent", "-d", ",", "-o", "report"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("could not be found"));

    assert!(files_matching(&dir, "report", ".xlsx").is_empty());
}

#[test]
fn test_cli_requires_all_arguments() {
    Command::cargo_bin("csv2xlsx")
        .unwrap()
        .args(["-i", "data.csv"])
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_cli_second_interrupt_exits_while_read_blocks() {
    use std::process::{Command as StdCommand, Stdio};
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    let dir = TempDir::new().unwrap();
    // Opening a fifo with no writer blocks the conversion on its source.
    let made = StdCommand::new("mkfifo")
        .arg(dir.path().join("in.csv"))
        .status()
        .unwrap();
    assert!(made.success());

    let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin("csv2xlsx"))
        .current_dir(dir.path())
        .args(["-i", "in", "-d", ",", "-o", "report"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    sleep(Duration::from_millis(500));

    for _ in 0..2 {
        StdCommand::new("kill")
            .arg("-INT")
            .arg(child.id().to_string())
            .status()
            .unwrap();
        sleep(Duration::from_millis(200));
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("process still running after two interrupts");
        }
        sleep(Duration::from_millis(50));
    };

    assert_eq!(status.code(), Some(130));
    assert!(files_matching(&dir, "report", ".xlsx").is_empty());
}
