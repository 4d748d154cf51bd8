//! CLI tests: run the `bagel` binary against a temporary workspace and a
//! local stub API.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

use serde_json::Value;
use tempfile::TempDir;

fn bagel_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("bagel");
    path
}

/// Serve a tiny paginated API on an ephemeral port.
///
/// `/v1/docs` returns two records on page 1 and an empty page after that;
/// `/v1/fail` always answers HTTP 500.
fn spawn_stub_api() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let request = String::from_utf8_lossy(&request);
            let target = request.split_whitespace().nth(1).unwrap_or("/");
            let (path, query) = target.split_once('?').unwrap_or((target, ""));
            let page = query
                .split('&')
                .find_map(|pair| pair.strip_prefix("page="))
                .unwrap_or("1");

            let (status, body) = match (path, page) {
                ("/v1/docs", "1") => ("200 OK", r#"[{"id":1},{"id":2}]"#),
                ("/v1/docs", _) => ("200 OK", "[]"),
                _ => ("500 Internal Server Error", r#"{"error":"boom"}"#),
            };
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    format!("http://{}/v1", addr)
}

fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[source]
name = "src"

[timebox]
backend = "sqlite"
path = "{root}/data/bagel.sqlite"

[storage]
backend = "local"
root = "{root}/landing"

[logging]
dir = "{root}/logs"
level = "warn"

[connector]
type = "http"
base_url = "{base_url}"
page_size = 2
timeout_secs = 5

[[tables]]
name = "Docs"
elt_type = "delta"

[[tables]]
name = "broken"
path = "fail"
"#,
        root = root.display(),
        base_url = base_url
    );

    let config_path = config_dir.join("bagel.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_bagel(root: &Path, config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = bagel_binary();
    let output = Command::new(&binary)
        .current_dir(root)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run {:?}: {}", binary, e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(files_under(&path));
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

// ─── init / tables ──────────────────────────────────────────────────

#[test]
fn test_init_creates_database_and_directories() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9/v1");

    let (stdout, stderr, success) = run_bagel(tmp.path(), &config, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/bagel.sqlite").exists());
    assert!(tmp.path().join("logs").is_dir());
    assert!(tmp.path().join("landing").is_dir());
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9/v1");

    let (_, stderr, success) = run_bagel(tmp.path(), &config, &["init"]);
    assert!(success, "first init failed: {}", stderr);
    let (_, stderr, success) = run_bagel(tmp.path(), &config, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_tables_lists_normalized_names() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9/v1");

    let (stdout, stderr, success) = run_bagel(tmp.path(), &config, &["tables"]);
    assert!(success, "tables failed: {}", stderr);
    assert!(stdout.contains("TABLE"));
    assert!(stdout.contains("docs"));
    assert!(stdout.contains("delta"));
    assert!(stdout.contains("broken"));
    assert!(!stdout.contains("Docs"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bagel.toml");
    fs::write(
        &config,
        "[source]\nname = \"src\"\n\n[[tables]]\nname = \"a\"\n\n[[tables]]\nname = \"A\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_bagel(tmp.path(), &config, &["tables"]);
    assert!(!success);
    assert!(stderr.contains("duplicate table"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, _, success) = run_bagel(tmp.path(), &tmp.path().join("nope.toml"), &["tables"]);
    assert!(!success);
}

// ─── timebox ────────────────────────────────────────────────────────

#[test]
fn test_timebox_set_then_get() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9/v1");

    let (stdout, stderr, success) = run_bagel(tmp.path(), &config, &["timebox", "get", "docs"]);
    assert!(success, "get failed: {}", stderr);
    assert!(stdout.contains("(no bookmark)"));

    let (stdout, stderr, success) = run_bagel(
        tmp.path(),
        &config,
        &["timebox", "set", "Docs", "2022-06-24T09:26:09.548513Z"],
    );
    assert!(success, "set failed: {}", stderr);
    assert!(stdout.contains("src/docs: 2022-06-24T09:26:09.548513Z"));

    let (stdout, _, success) = run_bagel(tmp.path(), &config, &["timebox", "get", "docs"]);
    assert!(success);
    assert!(stdout.contains("src/docs: 2022-06-24T09:26:09.548513Z"));
}

#[test]
fn test_timebox_set_accepts_rfc3339() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9/v1");

    let (stdout, stderr, success) = run_bagel(
        tmp.path(),
        &config,
        &["timebox", "set", "docs", "2022-06-24T11:26:09+02:00"],
    );
    assert!(success, "set failed: {}", stderr);
    assert!(stdout.contains("2022-06-24T09:26:09.000000Z"));
}

#[test]
fn test_timebox_rejects_unknown_table_and_bad_timestamp() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9/v1");

    let (_, stderr, success) = run_bagel(tmp.path(), &config, &["timebox", "get", "nope"]);
    assert!(!success);
    assert!(stderr.contains("not configured"));

    let (_, stderr, success) =
        run_bagel(tmp.path(), &config, &["timebox", "set", "docs", "yesterday"]);
    assert!(!success);
    assert!(stderr.contains("not a valid timestamp"));
}

// ─── run ────────────────────────────────────────────────────────────

#[test]
fn test_run_lands_files_and_isolates_failures() {
    let base_url = spawn_stub_api();
    let (tmp, config) = setup_test_env(&base_url);

    let (_, stderr, success) = run_bagel(tmp.path(), &config, &["run"]);
    assert!(!success, "run should fail because of the broken table");
    assert!(stderr.contains("Errors occurred in Bagel"), "stderr: {}", stderr);
    assert!(stderr.contains("broken"));

    let data = files_under(&tmp.path().join("landing/src/data/docs"));
    assert_eq!(data.len(), 1);
    let records: Value = serde_json::from_slice(&fs::read(&data[0]).unwrap()).unwrap();
    assert_eq!(records, serde_json::json!([{"id": 1}, {"id": 2}]));
    assert!(files_under(&tmp.path().join("landing/src/data/broken")).is_empty());

    assert_eq!(files_under(&tmp.path().join("landing/src/log/docs")).len(), 1);
    assert_eq!(files_under(&tmp.path().join("landing/src/log/broken")).len(), 1);

    let (stdout, _, success) = run_bagel(tmp.path(), &config, &["timebox", "get", "docs"]);
    assert!(success);
    assert!(!stdout.contains("(no bookmark)"));
}

#[test]
fn test_run_selected_table_succeeds() {
    let base_url = spawn_stub_api();
    let (tmp, config) = setup_test_env(&base_url);

    let (stdout, stderr, success) = run_bagel(tmp.path(), &config, &["run", "--table", "docs"]);
    assert!(success, "run failed: {}", stderr);
    assert!(stdout.contains("1 files landed for source 'src'"));
    assert!(files_under(&tmp.path().join("landing/src/log/broken")).is_empty());
}

#[test]
fn test_run_unknown_table_fails_before_running() {
    let base_url = spawn_stub_api();
    let (tmp, config) = setup_test_env(&base_url);

    let (_, stderr, success) = run_bagel(tmp.path(), &config, &["run", "--table", "nope"]);
    assert!(!success);
    assert!(stderr.contains("not configured"));
    assert!(files_under(&tmp.path().join("landing")).is_empty());
}

#[test]
fn test_run_without_connector_section_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bagel.toml");
    fs::write(
        &config,
        format!(
            "[source]\nname = \"src\"\n\n[storage]\nbackend = \"local\"\nroot = \"{}/landing\"\n\n[[tables]]\nname = \"docs\"\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_bagel(tmp.path(), &config, &["run"]);
    assert!(!success);
    assert!(stderr.contains("[connector]"));
}
