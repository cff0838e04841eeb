//! Behavioural tests for `marionette health` and `marionette run` against a
//! mock daemon.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn command_for(server: &MockServer, args: &[&str]) -> assert_cmd::Command {
    let address = server.address();
    let mut cmd = cargo_bin_cmd!("marionette");
    cmd.env(
        "MARIONETTE_DAEMON_BASE_URL",
        format!("http://{}", address.ip()),
    );
    cmd.env("MARIONETTE_DAEMON_PORT", address.port().to_string());
    cmd.env("MARIONETTE_DAEMON_TOKEN", "cli-token");
    cmd.env("MARIONETTE_MAX_HEALTH_RETRIES", "1");
    cmd.args(args);
    cmd
}

async fn healthy_daemon() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"healthy": true})))
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_a_healthy_daemon() {
    let server = healthy_daemon().await;

    command_for(&server, &["health"])
        .assert()
        .success()
        .stdout(contains("is healthy"));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_fails_for_an_unreachable_daemon() {
    let server = MockServer::start().await;
    let mut cmd = command_for(&server, &["health"]);
    drop(server);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("is not healthy"));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_sends_the_escaped_command() {
    let server = healthy_daemon().await;
    Mock::given(method("POST"))
        .and(path("/execute/command"))
        .and(header("authorization", "Bearer cli-token"))
        .and(body_json(json!({
            "action_type": "command",
            "command": "echo 'hello world'",
            "timeout": null,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    command_for(&server, &["run", "--", "echo", "hello world"])
        .assert()
        .success();
}

#[tokio::test(flavor = "multi_thread")]
async fn run_exits_one_when_the_command_fails() {
    let server = healthy_daemon().await;
    Mock::given(method("POST"))
        .and(path("/execute/command"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&server)
        .await;

    command_for(&server, &["run", "--", "false"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("command reported failure"));
}
