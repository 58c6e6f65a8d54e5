//! Integration tests for the `ct` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::{NamedTempFile, TempDir};

/// Write a config pointing at a database inside `dir`, with no credentials.
fn config_in(dir: &TempDir) -> NamedTempFile {
    let db_path = dir.path().join("data").join("ct.db");
    let mut config_file = NamedTempFile::new().unwrap();
    writeln!(config_file, r#"database_path = "{}""#, db_path.display()).unwrap();
    config_file.flush().unwrap();
    config_file
}

fn ct(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ct"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("GITHUB_TOKEN")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("CT_GITHUB_TOKEN")
        .env_remove("CT_API_KEY")
        .env_remove("CT_DATABASE_PATH")
        .output()
        .expect("Failed to run ct")
}

#[test]
fn test_help_lists_subcommands() {
    let output = Command::new(env!("CARGO_BIN_EXE_ct"))
        .arg("--help")
        .output()
        .expect("Failed to run ct --help");

    assert!(output.status.success());
    let help_text = String::from_utf8_lossy(&output.stdout);
    for command in ["sync", "commits", "analyze", "predict", "repos", "status"] {
        assert!(
            help_text.contains(command),
            "Expected '{command}' in help output: {help_text}"
        );
    }
}

#[test]
fn test_status_on_fresh_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    let output = ct(config.path(), &["status"]);

    assert!(
        output.status.success(),
        "status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No projects synced."), "{stdout}");
    assert!(dir.path().join("data").join("ct.db").exists());
}

#[test]
fn test_malformed_project_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    let output = ct(config.path(), &["commits", "not-a-repo"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("owner/repo"), "{stderr}");
}

#[test]
fn test_sync_without_token_fails_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(&dir);

    let output = ct(config.path(), &["sync", "octo/repo"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing GitHub token"), "{stderr}");
}

#[test]
fn test_out_of_range_tunable_is_rejected_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(&dir);
    writeln!(config, "\n[tunables]\nwrap_up_secs = 9223372036854775807").unwrap();
    config.flush().unwrap();

    let output = ct(config.path(), &["status"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid configuration"), "{stderr}");
    assert!(stderr.contains("wrap_up_secs"), "{stderr}");
}
