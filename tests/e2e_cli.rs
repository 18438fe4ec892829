//! CLI end-to-end tests
//!
//! Tests for the cutlist command-line interface. None of these need ffmpeg:
//! exports use `--dry-run`, which validates and prints the plan only.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the cutlist binary
#[allow(deprecated)]
fn cutlist_cmd() -> Command {
    let mut cmd = Command::cargo_bin("cutlist").unwrap();
    // Keep a ./cutlist.toml in the checkout out of the tests.
    cmd.current_dir(std::env::temp_dir());
    cmd
}

/// Write two placeholder sources and a manifest cutting from them.
fn write_job(dir: &Path, segments: &str) -> PathBuf {
    fs::write(dir.join("a.mp4"), b"").unwrap();
    fs::write(dir.join("b.mp4"), b"").unwrap();
    let manifest = dir.join("job.toml");
    fs::write(
        &manifest,
        format!(
            r#"
output = "out.mp4"
preset = "High"
resolution = "720p"

[[files]]
id = "a"
path = "a.mp4"

[[files]]
id = "b"
path = "b.mp4"

{segments}
"#
        ),
    )
    .unwrap();
    manifest
}

const TWO_SEGMENTS: &str = r#"
[[segments]]
file = "b"
start = 10
end = 12
order = 1

[[segments]]
file = "a"
start = 0
end = 5
order = 0
"#;

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = cutlist_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = cutlist_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cutlist"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = cutlist_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = cutlist_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}

#[test]
fn test_cli_presets_lists_everything() {
    let mut cmd = cutlist_cmd();
    cmd.arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("Social/Light"))
        .stdout(predicate::str::contains("crf 18"))
        .stdout(predicate::str::contains("854x480"));
}

#[test]
fn test_cli_export_help() {
    let mut cmd = cutlist_cmd();
    cmd.args(["export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("job manifest"));
}

#[test]
fn test_cli_export_nonexistent_manifest() {
    let mut cmd = cutlist_cmd();
    cmd.args(["export", "/nonexistent/job.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = cutlist_cmd();
    cmd.args(["probe", "/nonexistent/path/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_merge_nonexistent_file() {
    let mut cmd = cutlist_cmd();
    cmd.args(["merge", "/nonexistent/a.mp4", "/nonexistent/b.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_export_dry_run_orders_segments() {
    let temp = tempdir().unwrap();
    let manifest = write_job(temp.path(), TWO_SEGMENTS);

    let output = cutlist_cmd()
        .args(["export", "--dry-run"])
        .arg(&manifest)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 segment(s)"), "{stdout}");
    assert!(stdout.contains("force_divisible_by=2"), "{stdout}");
    assert!(stdout.contains("-f concat -safe 0"), "{stdout}");
    assert!(stdout.contains("concat=n=2:v=1:a=1[v][a]"), "{stdout}");
    assert!(stdout.contains("[DRY RUN]"), "{stdout}");

    // Order 0 (a.mp4 from 0s) is cut before order 1 (b.mp4 from 10s).
    let first = stdout.find("-ss 0.000").unwrap();
    let second = stdout.find("-ss 10.000").unwrap();
    assert!(first < second);

    // Nothing was written next to the sources.
    assert!(!temp.path().join("out.mp4").exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 3);
}

#[test]
fn test_cli_export_dry_run_output_override() {
    let temp = tempdir().unwrap();
    let manifest = write_job(temp.path(), TWO_SEGMENTS);
    let custom = temp.path().join("custom.mp4");

    cutlist_cmd()
        .args(["export", "--dry-run", "-o"])
        .arg(&custom)
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.mp4"));
}

#[test]
fn test_cli_export_rejects_inverted_segment() {
    let temp = tempdir().unwrap();
    let manifest = write_job(
        temp.path(),
        r#"
[[segments]]
file = "a"
start = 8
end = 3
"#,
    );

    cutlist_cmd()
        .args(["export", "--dry-run"])
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid segment"));
}

#[test]
fn test_cli_export_rejects_unknown_file() {
    let temp = tempdir().unwrap();
    let manifest = write_job(
        temp.path(),
        r#"
[[segments]]
file = "c"
start = 0
end = 1
"#,
    );

    cutlist_cmd()
        .args(["export", "--dry-run"])
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown file"));
}

#[test]
fn test_cli_validate_with_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("cutlist.toml");

    fs::write(
        &config_file,
        r#"
[export]
preset = "Ultra"
web_optimize = true
"#,
    )
    .unwrap();

    cutlist_cmd()
        .arg("validate")
        .arg(&config_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Web optimize: true"))
        .stdout(predicate::str::contains("not a known preset"));
}

#[test]
fn test_cli_validate_invalid_toml() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("cutlist.toml");
    fs::write(&config_file, "[export\n").unwrap();

    cutlist_cmd()
        .arg("validate")
        .arg(&config_file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}
