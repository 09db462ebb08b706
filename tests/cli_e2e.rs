//! End-to-end CLI tests for the webdownload binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A command isolated from the user's config file and terminal.
fn webdownload(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("webdownload").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG")
        .write_stdin("");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    webdownload(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve, save and track browser downloads"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    webdownload(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("webdownload"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    webdownload(&home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_without_input_exits_cleanly() {
    let home = TempDir::new().unwrap();
    webdownload(&home).arg("-q").assert().success();
}

#[test]
fn test_bridge_conflicts_with_dry_run() {
    let home = TempDir::new().unwrap();
    webdownload(&home)
        .args(["--bridge", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_dry_run_prints_resolved_plan() {
    let home = TempDir::new().unwrap();
    webdownload(&home)
        .args([
            "--dry-run",
            "--mime-type",
            "application/pdf",
            "https://example.com/files/report.bin",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""final_file_name":"report.pdf""#))
        .stdout(predicate::str::contains("system_download_manager"))
        .stdout(predicate::str::contains(r#""requires_confirmation":true"#));
}

#[test]
fn test_dry_run_reads_urls_from_stdin() {
    let home = TempDir::new().unwrap();
    let output = webdownload(&home)
        .arg("--dry-run")
        .write_stdin("# skipped\nhttps://example.com/a.png\n\nhttps://example.com/b.zip\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["plan"]["destination"], "media_store_insert");
    assert_eq!(lines[0]["plan"]["is_image"], true);
    assert_eq!(lines[1]["plan"]["final_mime_type"], "application/zip");
}

#[test]
fn test_dry_run_legacy_storage_streams_images() {
    let home = TempDir::new().unwrap();
    webdownload(&home)
        .args(["--dry-run", "--legacy-storage", "https://example.com/cat.jpg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("manual_http_stream"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_saves_into_output_dir() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
        .mount(&server)
        .await;
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    webdownload(&home)
        .args(["-q", "-y", "--no-probe", "--legacy-storage", "-o"])
        .arg(out.path())
        .arg(format!("{}/docs/report.pdf", server.uri()))
        .assert()
        .success();

    let saved = out.path().join("Download").join("report.pdf");
    assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.4");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_download_exits_with_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let home = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    webdownload(&home)
        .args(["-q", "-y", "--no-probe", "--legacy-storage", "-o"])
        .arg(out.path())
        .arg(format!("{}/gone.pdf", server.uri()))
        .assert()
        .failure();
}
