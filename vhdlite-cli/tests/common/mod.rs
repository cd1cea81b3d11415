#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use std::time::Duration;

/// A `vhdlite` command isolated from the caller's environment.
pub fn vhdlite() -> Command {
    let bin_path = env!("CARGO_BIN_EXE_vhdlite");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("VHDLITE_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Write a JSON options file into `dir` and return its path.
pub fn write_config(dir: &Path, json: &str) -> std::path::PathBuf {
    let path = dir.join("vhdlite.json");
    std::fs::write(&path, json).expect("Failed to write config file");
    path
}
