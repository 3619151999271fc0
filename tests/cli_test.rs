use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a `dokploy-provider` command isolated from the caller's environment.
fn provider_cmd() -> Command {
    let mut cmd = assert_cmd::cargo_bin_cmd!("dokploy-provider");
    cmd.env_remove("DOKPLOY_HOST")
        .env_remove("DOKPLOY_API_KEY")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> String {
    let file = dir.path().join(name);
    fs::write(&file, serde_json::to_string(value).unwrap()).unwrap();
    file.to_string_lossy().into_owned()
}

#[test]
fn test_schema_lists_all_resources() {
    let output = provider_cmd().arg("schema").output().unwrap();
    assert!(output.status.success());

    let schemas: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = schemas
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["type_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["dokploy_database", "dokploy_environment_variables"]);
}

#[test]
fn test_schema_for_single_type() {
    provider_cmd()
        .args(["schema", "dokploy_environment_variables"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create_env_file"))
        .stdout(predicate::str::contains("dokploy_database").not());
}

#[test]
fn test_schema_for_unknown_type_fails() {
    provider_cmd()
        .args(["schema", "dokploy_project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported resource type"));
}

#[test]
fn test_import_needs_no_server() {
    let output = provider_cmd()
        .args(["import", "dokploy_database", "mongo:mg-3"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let state: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(state["id"], "mg-3");
    assert_eq!(state["type"], "mongo");
}

#[test]
fn test_read_without_host_fails() {
    let dir = TempDir::new().unwrap();
    let state = write_json(&dir, "state.json", &json!({ "id": "pg-1", "type": "postgres" }));

    provider_cmd()
        .args(["--api-key", "k", "read", "dokploy_database", "--state", state.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("host is not set"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("dokploy.yaml");
    fs::write(&config, "host: https://dokploy.example.com\nregion: eu\n").unwrap();
    let state = write_json(&dir, "state.json", &json!({ "id": "pg-1" }));

    provider_cmd()
        .arg("--config")
        .arg(&config)
        .args(["read", "dokploy_database", "--state", state.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_read_environment_variables_against_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/application.one"))
        .and(query_param("applicationId", "app-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "applicationId": "app-1",
            "env": "A=1\nB=2"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = dir.path().join("dokploy.yaml");
    fs::write(
        &config,
        format!("host: {}\napi_key: secret\ntimeout_secs: 5\n", server.uri()),
    )
    .unwrap();
    let state = write_json(
        &dir,
        "state.json",
        &json!({ "id": "app-1", "application_id": "app-1", "variables": { "A": "1" } }),
    );

    let output = tokio::task::spawn_blocking(move || {
        provider_cmd()
            .arg("--config")
            .arg(&config)
            .args(["read", "dokploy_environment_variables", "--state", state.as_str()])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let new_state: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(new_state["variables"], json!({ "A": "1", "B": "2" }));
    assert_eq!(new_state["create_env_file"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_read_of_missing_resource_prints_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/postgres.one"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Postgres not found"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state = write_json(&dir, "state.json", &json!({ "id": "pg-1", "type": "postgres" }));
    let host = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        provider_cmd()
            .args(["--host", host.as_str(), "--api-key", "secret"])
            .args(["read", "dokploy_database", "--state", state.as_str()])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "null");
}
