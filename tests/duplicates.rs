mod common;

use common::{create, hashcheck_cmd};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn match_reports_identical_files_across_trees() {
    let temp = TempDir::new().unwrap();
    let one = temp.path().join("one");
    let two = temp.path().join("two");
    fs::create_dir(&one).unwrap();
    fs::create_dir_all(two.join("sub")).unwrap();
    fs::write(one.join("photo.jpg"), "same bytes").unwrap();
    fs::write(one.join("empty"), "").unwrap();
    fs::write(two.join("sub/copy.jpg"), "same bytes").unwrap();
    fs::write(two.join("empty"), "").unwrap();
    fs::write(two.join("unique"), "different").unwrap();
    create(&one);
    create(&two);

    let output = hashcheck_cmd()
        .arg("match")
        .arg(&one)
        .arg(&two)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "unexpected output: {stdout}");
    assert_eq!(lines[0], format!("{}: processing .hashcheck", one.display()));
    assert_eq!(lines[1], format!("{}: processing .hashcheck", two.display()));

    let fields: Vec<&str> = lines[2].split('\t').collect();
    assert_eq!(fields.len(), 9);
    assert_eq!(fields[1], "10");
    assert_eq!(fields[2], "10");
    assert_eq!(fields[5], "copy.jpg");
    assert_eq!(fields[6], "photo.jpg");
    assert_eq!(fields[7], two.join("sub/copy.jpg").display().to_string());
    assert_eq!(fields[8], one.join("photo.jpg").display().to_string());
}

#[test]
fn match_skips_directories_without_manifest() {
    let temp = TempDir::new().unwrap();

    hashcheck_cmd()
        .arg("match")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(format!("{}: no .hashcheck found\n", temp.path().display()));
}

#[test]
fn match_warns_about_unreadable_manifest() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(".hashcheck"), "not a manifest\n").unwrap();

    hashcheck_cmd()
        .arg("match")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("skipping unreadable manifest"));
}
