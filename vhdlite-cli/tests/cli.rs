use predicates::prelude::*;
use rstest::rstest;

mod common;

#[test]
fn test_help_lists_commands() {
    common::vhdlite()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("detach"))
        .stdout(predicate::str::contains("run-bypassed"));
}

#[rstest]
#[case::create_without_path(&["create"])]
#[case::detach_without_targets(&["detach"])]
#[case::run_without_command(&["run-bypassed", "disk.vhdx"])]
#[case::unknown_subcommand(&["attach", "disk.vhdx"])]
#[case::size_not_a_number(&["create", "disk.vhdx", "--size-gb", "ten"])]
#[case::parent_with_size(&["create", "c.vhdx", "--parent", "b.vhdx", "--size-gb", "4"])]
fn test_usage_errors(#[case] args: &[&str]) {
    common::vhdlite()
        .args(args)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_oversized_block_rejected_before_native_call() {
    common::vhdlite()
        .args(["create", "disk.vhdx", "--block-size-mb", "4096"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("32-bit"));
}

#[test]
fn test_missing_config_file() {
    common::vhdlite()
        .args(["--config", "/nonexistent/vhdlite.json", "create", "disk.vhdx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config error"));
}

#[test]
fn test_config_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::write_config(dir.path(), "{ not json");

    common::vhdlite()
        .env("VHDLITE_CONFIG", &config)
        .args(["create", "disk.vhdx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[cfg(not(windows))]
mod unsupported_host {
    use super::*;

    #[test]
    fn test_create_reports_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let disk = dir.path().join("disk.vhdx");

        common::vhdlite()
            .arg("create")
            .arg(&disk)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not supported"));
        assert!(!disk.exists());
    }

    #[test]
    fn test_create_uses_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = common::write_config(
            dir.path(),
            r#"{"default_size_gb": 64, "format": "vhdx"}"#,
        );

        common::vhdlite()
            .arg("--config")
            .arg(&config)
            .args(["create", "disk.vhdx"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not supported"));
    }

    #[test]
    fn test_detach_summarizes_all_failures() {
        common::vhdlite()
            .args(["detach", "a.vhdx", "b.vhdx"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to detach all 2 disk(s)"))
            .stderr(predicate::str::contains("a.vhdx"))
            .stderr(predicate::str::contains("b.vhdx"));
    }

    #[test]
    fn test_run_bypassed_does_not_start_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");

        common::vhdlite()
            .args(["run-bypassed", "disk.vhdx", "--", "touch"])
            .arg(&marker)
            .assert()
            .failure()
            .stderr(predicate::str::contains("not supported"));
        assert!(!marker.exists());
    }
}
