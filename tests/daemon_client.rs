//! Protocol tests for the daemon HTTP client against a mock daemon.

use std::time::Duration;

use marionette::action::{Click, KeyDown, ShellCommand, TypeText};
use marionette::{
    Action, AuthToken, ClientError, DaemonClient, DaemonEndpoint, InputDevice, Key, MouseButton,
    Screenshot, ScreenshotFormat,
};
use marionette::test_support::closed_local_port;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn client_for(server: &MockServer) -> DaemonClient {
    let address = server.address();
    let endpoint = DaemonEndpoint::new(
        format!("http://{}", address.ip()),
        address.port(),
        AuthToken::new(TOKEN),
    );
    DaemonClient::new(endpoint, Duration::from_secs(5))
}

fn key(name: &str) -> Key {
    Key::new(name).unwrap_or_else(|err| panic!("valid key {name}: {err}"))
}

async fn mount_success(server: &MockServer, route: &str) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn key_down_posts_the_action_with_a_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute/keyboard/key_down"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(body_json(json!({"action_type": "key_down", "key": "a"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .execute(&KeyDown { key: key("a") }.into())
        .await;

    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn validation_replies_surface_the_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute/type"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"detail": "text must not be empty"})),
        )
        .mount(&server)
        .await;

    let result = client_for(&server)
        .execute(&Action::from(TypeText {
            text: String::from("hi"),
        }))
        .await;

    match result {
        Err(ClientError::Validation { operation, detail }) => {
            assert_eq!(operation, "execute_type");
            assert!(detail.contains("text must not be empty"), "detail: {detail}");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn unsuccessful_execution_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute/command"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .shell(&ShellCommand::new("false"))
        .await;

    assert!(result.as_ref().is_err_and(ClientError::is_rejected), "{result:?}");
}

#[tokio::test]
async fn server_errors_and_malformed_bodies_are_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/execute/keyboard/key_up"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/observation/mouse_state"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let status_failure = client.key_up(&key("a")).await;
    let body_failure = client.mouse_state().await;

    match status_failure {
        Err(ClientError::Transport { status, .. }) => assert_eq!(status, Some(500)),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert!(
        body_failure.as_ref().is_err_and(ClientError::is_transport),
        "{body_failure:?}"
    );
}

#[tokio::test]
async fn refused_connection_is_a_transport_failure_without_status() {
    let port = closed_local_port().unwrap_or_else(|err| panic!("free port: {err}"));
    let client = DaemonClient::new(
        DaemonEndpoint::new("http://127.0.0.1", port, AuthToken::new(TOKEN)),
        Duration::from_secs(5),
    );

    let result = client.health().await;

    match result {
        Err(ClientError::Transport {
            operation, status, ..
        }) => {
            assert_eq!(operation, "health_check");
            assert_eq!(status, None);
        }
        other => panic!("expected a connection failure, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_replies_hit_the_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"healthy": true}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let address = server.address();
    let client = DaemonClient::new(
        DaemonEndpoint::new(
            format!("http://{}", address.ip()),
            address.port(),
            AuthToken::new(TOKEN),
        ),
        Duration::from_millis(200),
    );

    let result = client.health().await;

    assert!(
        matches!(result, Err(ClientError::Transport { status: None, .. })),
        "{result:?}"
    );
}

#[tokio::test]
async fn invalid_actions_never_reach_the_daemon() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let result = client
        .execute(&Action::from(marionette::action::Hotkey { keys: Vec::new() }))
        .await;

    assert!(matches!(result, Err(ClientError::InvalidAction(_))));
    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn click_actions_have_no_route() {
    let server = MockServer::start().await;

    let result = client_for(&server).execute(&Click::new(3, 4).into()).await;

    assert_eq!(
        result,
        Err(ClientError::NoRoute {
            action_type: "click"
        })
    );
}

#[tokio::test]
async fn click_is_sent_as_move_down_up() {
    let server = MockServer::start().await;
    for route in [
        "/execute/mouse/move",
        "/execute/mouse/button_down",
        "/execute/mouse/button_up",
    ] {
        mount_success(&server, route).await;
    }
    let click = Click::new(3, 4)
        .with_button(MouseButton::Right)
        .with_press_duration(Duration::from_millis(10));

    let result = client_for(&server).click(&click).await;

    assert_eq!(result, Ok(()));
    let received = server.received_requests().await.unwrap_or_default();
    let paths: Vec<&str> = received.iter().map(|request| request.url.path()).collect();
    assert_eq!(
        paths,
        vec![
            "/execute/mouse/move",
            "/execute/mouse/button_down",
            "/execute/mouse/button_up",
        ]
    );
    let bodies: Vec<Value> = received
        .iter()
        .filter_map(|request| serde_json::from_slice(&request.body).ok())
        .collect();
    assert_eq!(
        bodies.first().and_then(|body| body.get("x")),
        Some(&json!(3))
    );
    assert_eq!(
        bodies.get(1).and_then(|body| body.get("button")),
        Some(&json!("right"))
    );
}

#[tokio::test]
async fn screenshot_bytes_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/observation/screenshot"))
        .and(query_param("display_id", "1"))
        .and(query_param("format", "base64"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"screenshot": "aGVsbG8="})))
        .mount(&server)
        .await;

    let shot = client_for(&server)
        .screenshot(1, ScreenshotFormat::Bytes)
        .await;

    assert_eq!(shot, Ok(Screenshot::Bytes(b"hello".to_vec())));
}

#[tokio::test]
async fn empty_screenshots_are_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/observation/screenshot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"screenshot": ""})))
        .mount(&server)
        .await;

    let shot = client_for(&server)
        .screenshot(0, ScreenshotFormat::Path)
        .await;

    assert!(shot.as_ref().is_err_and(ClientError::is_transport), "{shot:?}");
}

#[tokio::test]
async fn input_states_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/observation/mouse_state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "buttons": {"left": true, "right": false, "middle": false},
            "position": [10, 20],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/observation/keyboard_state"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"keys": {"shift": true, "a": false}})),
        )
        .mount(&server)
        .await;
    let client = client_for(&server);

    let mouse = client
        .mouse_state()
        .await
        .unwrap_or_else(|err| panic!("mouse state: {err}"));
    let keyboard = client
        .keyboard_state()
        .await
        .unwrap_or_else(|err| panic!("keyboard state: {err}"));

    assert_eq!(mouse.position, (10, 20));
    assert!(mouse.is_pressed(MouseButton::Left));
    assert!(!mouse.is_pressed(MouseButton::Right));
    let pressed: Vec<&str> = keyboard.pressed().map(Key::as_str).collect();
    assert_eq!(pressed, vec!["shift"]);
}

#[tokio::test]
async fn empty_input_states_are_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/observation/keyboard_state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keys": {}})))
        .mount(&server)
        .await;

    let result = client_for(&server).keyboard_state().await;

    assert!(result.as_ref().is_err_and(ClientError::is_transport), "{result:?}");
}
