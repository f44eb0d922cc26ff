mod common;

use common::{create, hashcheck_cmd};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn find_processes_every_tree_and_summarizes() {
    let temp = TempDir::new().unwrap();
    let good = temp.path().join("good");
    let bad = temp.path().join("nested/bad");
    fs::create_dir_all(&good).unwrap();
    fs::create_dir_all(&bad).unwrap();
    fs::write(good.join("f"), "fine").unwrap();
    fs::write(bad.join("f"), "doomed").unwrap();
    create(&good);
    create(&bad);
    fs::remove_file(bad.join("f")).unwrap();

    hashcheck_cmd()
        .arg("verify")
        .arg("--find")
        .arg(temp.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("verify OK, 1 files checked"))
        .stdout(predicate::str::contains("L  ./f"))
        .stdout(predicate::str::contains(
            "Summary: 2 directories, 1 with problems, 1 pending accept, 0 pending review",
        ));
}

#[test]
fn literal_directories_continue_past_failure() {
    let temp = TempDir::new().unwrap();
    let missing_manifest = temp.path().join("a");
    let good = temp.path().join("b");
    fs::create_dir(&missing_manifest).unwrap();
    fs::create_dir(&good).unwrap();
    create(&good);

    hashcheck_cmd()
        .arg("verify")
        .arg(&missing_manifest)
        .arg(&good)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not initialized"))
        .stdout(predicate::str::contains("verify OK, 0 files checked"));
}

#[test]
fn pending_only_batch_exits_three() {
    let temp = TempDir::new().unwrap();
    create(temp.path());
    fs::write(temp.path().join("new"), "n").unwrap();

    hashcheck_cmd()
        .arg("verify")
        .arg("--find")
        .arg(temp.path())
        .assert()
        .code(3)
        .stdout(predicate::str::contains("A  ./new"));

    hashcheck_cmd()
        .arg("expand")
        .arg("--find")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("1 files added to manifest"));

    hashcheck_cmd()
        .arg("verify")
        .arg("--find")
        .arg(temp.path())
        .assert()
        .success();
    assert!(!temp.path().join(".hashcheck.new").exists());
}

#[test]
fn find_without_manifests_is_discovery_error() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("empty")).unwrap();

    hashcheck_cmd()
        .arg("verify")
        .arg("--find")
        .arg(temp.path())
        .assert()
        .code(4)
        .stderr(predicate::str::contains("No .hashcheck files found"));
}
