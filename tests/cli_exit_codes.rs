use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: &[&str] = &[
    "FIGMA_TOKEN",
    "FIGMA_OAUTH_TOKEN",
    "FIGMA_TRANSPORT",
    "FIGMA_BRIDGE_HOST",
    "FIGMA_DEPLOYED",
    "FIGMA_MCP_URL",
    "FIGMA_MCP_ENABLED",
    "FIGMA_MCP_TIMEOUT_MS",
    "FIGMA_MCP_RETRY_ATTEMPTS",
    "FIGMA_MCP_RETRY_DELAY_MS",
    "FIGMA_MCP_LOG_LEVEL",
    "RUST_LOG",
];

fn write_config(dir: &Path, api_base_url: &str) -> std::path::PathBuf {
    let path = dir.join("bridge.toml");
    std::fs::write(
        &path,
        format!("[service]\ntransport = \"direct\"\napi_base_url = \"{api_base_url}\"\n"),
    )
    .expect("write config");
    path
}

fn run(home: &Path, args: &[&str], envs: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_figma-bridge"));
    cmd.args(args).env("HOME", home);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.envs(envs.iter().copied());
    cmd.output().expect("run figma-bridge")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[tokio::test(flavor = "multi_thread")]
async fn file_command_prints_live_data() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/files/KEY"))
        .and(header("X-Figma-Token", "cli-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Marketing site",
            "document": {"id": "0:0", "type": "DOCUMENT", "children": []}
        })))
        .expect(1)
        .mount(&api)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), &api.uri());
    let config = config.to_str().unwrap().to_string();
    let home = dir.path().to_path_buf();

    let output = tokio::task::spawn_blocking(move || {
        run(
            &home,
            &["file", "KEY", "--config", &config],
            &[("FIGMA_TOKEN", "cli-token")],
        )
    })
    .await
    .expect("join");

    assert_eq!(output.status.code(), Some(0));
    let body = stdout_json(&output);
    assert_eq!(body["source"], "live");
    assert_eq!(body["data"]["name"], "Marketing site");
}

#[test]
fn file_command_without_token_reports_mock_data() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), "http://127.0.0.1:1");

    let output = run(
        dir.path(),
        &["file", "KEY", "--config", config.to_str().unwrap()],
        &[],
    );

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_json(&output)["source"], "mock");
}

#[test]
fn thumbnails_with_only_malformed_ids_succeed_with_errors() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), "http://127.0.0.1:1");

    let output = run(
        dir.path(),
        &["thumbnails", "KEY", "bad-id", "--config", config.to_str().unwrap()],
        &[],
    );

    assert_eq!(output.status.code(), Some(0));
    let body = stdout_json(&output);
    assert_eq!(body["errors"]["bad-id"], "Invalid node ID format: bad-id");
    assert_eq!(body["images"], json!({}));
}

#[test]
fn missing_config_file_exits_with_error_payload() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("nope.toml");

    let output = run(
        dir.path(),
        &["status", "--config", missing.to_str().unwrap()],
        &[],
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let payload: Value = stderr
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str(line).ok())
        .expect("error payload on stderr");
    assert_eq!(payload["category"], "config");
}

#[test]
fn rejected_env_override_is_logged() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), "http://127.0.0.1:1");

    let output = run(
        dir.path(),
        &["status", "--config", config.to_str().unwrap()],
        &[("FIGMA_MCP_TIMEOUT_MS", "soon")],
    );

    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("FIGMA_MCP_TIMEOUT_MS"), "stderr was: {stderr}");
}

#[test]
fn status_reports_summary_without_token() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_config(dir.path(), "http://127.0.0.1:1");

    let output = run(
        dir.path(),
        &["status", "--config", config.to_str().unwrap()],
        &[("FIGMA_TOKEN", "very-secret-token")],
    );

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("very-secret-token"));
    let body = stdout_json(&output);
    assert_eq!(body["config"]["transport"], "direct");
    assert_eq!(body["connection"]["state"]["status"], "disconnected");
}
