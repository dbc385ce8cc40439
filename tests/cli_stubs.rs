use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use spc_lib::error::ErrorCategory;
use spc_lib::SpcOutput;

fn bin_path() -> PathBuf {
    std::env::var("CARGO_BIN_EXE_spc")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("target")
                .join("debug")
                .join(if cfg!(windows) { "spc.exe" } else { "spc" })
        })
}

fn run_cmd(args: &[&str], home: &Path) -> Output {
    // Isolate from any central config in the real home directory.
    Command::new(bin_path())
        .args(args)
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("run spc command")
}

fn parse_json(stdout: &[u8]) -> SpcOutput {
    serde_json::from_slice(stdout).expect("output should be valid JSON")
}

fn expect_error(output: &Output, category: ErrorCategory) -> String {
    assert_eq!(
        output.status.code(),
        Some(2),
        "expected exit code 2, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    match parse_json(&output.stdout) {
        SpcOutput::Error(err) => {
            assert_eq!(err.error.category, category);
            err.error.message
        }
        other => panic!("expected error output, got {other:?}"),
    }
}

fn components_file(dir: &Path) -> PathBuf {
    let path = dir.join("components.json");
    let mut file = std::fs::File::create(&path).expect("create components");
    file.write_all(br#"[{"id": "1:1", "name": "Title", "type": "TEXT"}]"#)
        .expect("write components");
    path
}

#[test]
fn invalid_url_exits_with_json_error() {
    let home = tempfile::tempdir().expect("tempdir");
    let components = components_file(home.path());
    let output = run_cmd(
        &[
            "compare",
            "--components",
            components.to_str().expect("utf8 path"),
            "--url",
            "not a url",
        ],
        home.path(),
    );

    let message = expect_error(&output, ErrorCategory::Config);
    assert!(
        message.to_ascii_lowercase().contains("url") || message.contains("relative"),
        "unexpected message: {message}"
    );
}

#[test]
fn incomplete_auth_is_rejected_before_browser_launch() {
    let home = tempfile::tempdir().expect("tempdir");
    let components = components_file(home.path());
    let output = run_cmd(
        &[
            "compare",
            "--components",
            components.to_str().expect("utf8 path"),
            "--url",
            "https://example.com",
            "--auth",
            r#"{"type": "credentials", "loginUrl": "https://example.com/login", "username": "u"}"#,
        ],
        home.path(),
    );

    let message = expect_error(&output, ErrorCategory::Auth);
    assert!(message.contains("password"), "unexpected message: {message}");
}

#[test]
fn missing_config_file_is_config_error() {
    let home = tempfile::tempdir().expect("tempdir");
    let missing = home.path().join("nope.toml");
    let output = run_cmd(
        &[
            "compare",
            "--components",
            "components.json",
            "--url",
            "https://example.com",
            "--config",
            missing.to_str().expect("utf8 path"),
        ],
        home.path(),
    );

    let message = expect_error(&output, ErrorCategory::Config);
    assert!(message.contains("nope.toml"), "unexpected message: {message}");
}

#[test]
fn invalid_config_values_are_rejected() {
    let home = tempfile::tempdir().expect("tempdir");
    let config = home.path().join("spc.toml");
    std::fs::write(&config, "[severity.color]\nmedium = 60.0\nhigh = 50.0\n").expect("write config");
    let output = run_cmd(
        &[
            "compare",
            "--components",
            "components.json",
            "--url",
            "https://example.com",
            "--config",
            config.to_str().expect("utf8 path"),
        ],
        home.path(),
    );

    let message = expect_error(&output, ErrorCategory::Config);
    assert!(message.contains("severity.color"), "unexpected message: {message}");
}

#[test]
fn empty_batch_manifest_is_config_error() {
    let home = tempfile::tempdir().expect("tempdir");
    let manifest = home.path().join("runs.json");
    std::fs::write(&manifest, "[]").expect("write manifest");
    let output = run_cmd(
        &["batch", "--manifest", manifest.to_str().expect("utf8 path")],
        home.path(),
    );

    let message = expect_error(&output, ErrorCategory::Config);
    assert!(message.contains("no requests"), "unexpected message: {message}");
}
