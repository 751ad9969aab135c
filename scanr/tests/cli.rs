//! Process-level tests for the `scanr` binary.
//!
//! These run the real executable against the built-in pattern scanner and
//! check exit codes, diagnostics and the written file.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn scanr() -> Command {
    let mut cmd = Command::cargo_bin("scanr").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn unknown_device_fails_the_open() {
    scanr()
        .args(["--device", "bogus"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("open: Invalid argument"))
        .stdout(predicate::str::contains("bytes of data received").not());
}

#[test]
fn zero_width_fails_the_start() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.ppm");

    scanr()
        .arg(&path)
        .args(["--width", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("start: Invalid argument"));

    assert!(!path.exists());
}

#[test]
fn small_scan_is_saved_as_ppm() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scan.ppm");

    scanr()
        .args(["--width", "100", "--height", "50"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("image size: 100x50"))
        .stdout(predicate::str::contains("15000 bytes of data received"))
        .stderr(predicate::str::contains("note:").not());

    let contents = fs::read(&path).unwrap();
    assert!(contents.starts_with(b"P6\n100 50 255\n"));
    assert_eq!(contents.len(), b"P6\n100 50 255\n".len() + 15_000);
}

#[test]
fn unwritable_output_still_exits_zero() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("scan.ppm");

    scanr()
        .args(["--width", "10", "--height", "10"])
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("scanning without saving"))
        .stdout(predicate::str::contains("300 bytes of data received"));

    assert!(!path.exists());
}

#[test]
fn list_shows_the_pattern_scanner() {
    scanr()
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("pattern"));
}
