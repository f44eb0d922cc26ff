use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::fs;
use std::path::Path;

/// A `hashcheck` command isolated from the caller's logging and config
/// environment.
pub fn hashcheck_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("hashcheck");
    cmd.env_remove("RUST_LOG").env_remove("HASHCHECK_CONFIG");
    cmd
}

// Each integration test file is compiled as its own crate, and not all of
// them create trees through the binary.
#[allow(dead_code)]
pub fn create(dir: &Path) {
    hashcheck_cmd().arg("create").arg(dir).assert().success();
}

#[allow(dead_code)]
pub fn run_ok(dir: &Path, mode: &str) {
    hashcheck_cmd().arg(mode).arg(dir).assert().success();
}

#[allow(dead_code)]
pub fn manifest_text(dir: &Path) -> String {
    fs::read_to_string(dir.join(".hashcheck")).expect("manifest should be readable")
}
