//! End-to-end tests for the `dw` binary

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn dw(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dw"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run dw")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path is UTF-8")
}

#[test]
fn test_config_example_is_valid_toml() {
    let output = dw(&["config", "example"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let value: toml::Value = toml::from_str(&stdout).unwrap();
    assert_eq!(value["watch"]["recursion_depth"].as_integer(), Some(-1));
}

#[test]
fn test_ls_json_lists_entries() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("a.txt"), "abc").unwrap();
    std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
    std::fs::write(temp_dir.path().join("sub/b.txt"), "b").unwrap();

    let output = dw(&["ls", path_arg(temp_dir.path()), "-d", "1", "--json"]);
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut entries: Vec<(String, String)> = stdout
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            (
                value["name"].as_str().unwrap().to_string(),
                value["kind"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    entries.sort();

    assert_eq!(
        entries,
        [
            ("a.txt".to_string(), "file".to_string()),
            ("sub".to_string(), "dir".to_string()),
            ("sub/b.txt".to_string(), "file".to_string()),
        ]
    );
}

#[test]
fn test_ls_missing_folder_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing");

    let output = dw(&["ls", path_arg(&missing)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot list"));
}

#[test]
fn test_watch_rejects_invalid_flags() {
    let temp_dir = TempDir::new().unwrap();

    let output = dw(&["watch", path_arg(temp_dir.path()), "--debounce-ms", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid watch configuration"));
}
