//! HTTP client for the daemon's RPC surface.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::action::{
    Action, Key, KeyDown, KeyUp, MouseButton, MouseButtonDown, MouseButtonUp, MouseMove,
    MouseScroll, ShellCommand,
};
use crate::device::{DeviceFuture, InputDevice};
use crate::observation::{KeyboardState, MouseState, Screenshot, ScreenshotFormat};

use super::protocol::{HealthResponse, ScreenshotResponse, SuccessResponse, ValidationBody};
use super::{ClientError, DaemonEndpoint, Operation};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin RPC client: one method per daemon route, bearer auth on every call.
///
/// Composite gestures such as clicks come from [`InputDevice`] and are
/// decomposed into primitive calls on this client.
#[derive(Clone, Debug)]
pub struct DaemonClient {
    http: reqwest::Client,
    endpoint: DaemonEndpoint,
}

impl DaemonClient {
    /// Creates a client whose requests time out after `request_timeout`.
    #[must_use]
    pub fn new(endpoint: DaemonEndpoint, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, ?request_timeout, "HTTP client setup failed; requests have no timeout");
                reqwest::Client::new()
            });
        Self { http, endpoint }
    }

    /// Endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &DaemonEndpoint {
        &self.endpoint
    }

    /// Reports the daemon's self-assessed health.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the daemon cannot be reached or
    /// answers with anything other than a health document.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let body: HealthResponse = self.fetch(Operation::Health, &[]).await?;
        Ok(body.healthy)
    }

    /// Captures display `display_id` in the requested representation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] for request failures and for empty or
    /// undecodable payloads, and [`ClientError::Validation`] when the daemon
    /// rejects the query.
    pub async fn screenshot(
        &self,
        display_id: u32,
        format: ScreenshotFormat,
    ) -> Result<Screenshot, ClientError> {
        let query = [
            ("display_id", display_id.to_string()),
            ("format", format.wire_value().to_owned()),
        ];
        let body: ScreenshotResponse = self.fetch(Operation::Screenshot, &query).await?;
        Screenshot::from_wire(format, body.screenshot)
            .map_err(|err| ClientError::observation(Operation::Screenshot, &err))
    }

    /// Reads pointer position and button states.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] for request failures or a state
    /// listing no buttons.
    pub async fn mouse_state(&self) -> Result<MouseState, ClientError> {
        let state: MouseState = self.fetch(Operation::MouseState, &[]).await?;
        state
            .validate()
            .map_err(|err| ClientError::observation(Operation::MouseState, &err))?;
        Ok(state)
    }

    /// Reads which keys are held down.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] for request failures or a state
    /// listing no keys.
    pub async fn keyboard_state(&self) -> Result<KeyboardState, ClientError> {
        let state: KeyboardState = self.fetch(Operation::KeyboardState, &[]).await?;
        state
            .validate()
            .map_err(|err| ClientError::observation(Operation::KeyboardState, &err))?;
        Ok(state)
    }

    /// Runs a shell command on the daemon's host.
    ///
    /// # Errors
    ///
    /// See [`DaemonClient::execute`].
    pub async fn shell(&self, command: &ShellCommand) -> Result<(), ClientError> {
        self.execute(&Action::from(command.clone())).await
    }

    /// Sends `action` to its dedicated route.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidAction`] before any request when local
    /// validation fails, [`ClientError::NoRoute`] for click gestures,
    /// [`ClientError::Rejected`] when the daemon reports failure, and the
    /// transport or validation variants for protocol failures.
    pub async fn execute(&self, action: &Action) -> Result<(), ClientError> {
        action.validate()?;
        let operation = Operation::for_action(action).ok_or_else(|| ClientError::NoRoute {
            action_type: action.action_type(),
        })?;
        let request = self.request(operation).json(action);
        let body: SuccessResponse = self.send(operation, request).await?;
        if body.success {
            Ok(())
        } else {
            Err(ClientError::Rejected {
                operation: operation.name(),
            })
        }
    }

    fn request(&self, operation: Operation) -> RequestBuilder {
        self.http
            .request(operation.method(), self.endpoint.url_for(operation.path()))
            .bearer_auth(self.endpoint.token().expose())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: Operation,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let request = self.request(operation).query(query);
        self.send(operation, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        debug!(
            operation = operation.name(),
            daemon = %self.endpoint.url(),
            "sending daemon request"
        );
        let response = request
            .send()
            .await
            .map_err(|err| ClientError::transport(operation, &err))?;
        decode(operation, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    operation: Operation,
    response: Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ValidationBody>(&text)
            .map_or(text, |body| body.detail.to_string());
        return Err(ClientError::Validation {
            operation: operation.name(),
            detail,
        });
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ClientError::Transport {
            operation: operation.name(),
            status: Some(status.as_u16()),
            message: format!("unexpected status {status}: {text}"),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::Transport {
            operation: operation.name(),
            status: Some(status.as_u16()),
            message: format!("malformed response body: {err}"),
        })
}

impl InputDevice for DaemonClient {
    type Error = ClientError;

    fn key_down<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, ClientError> {
        Box::pin(async move {
            let action = Action::from(KeyDown { key: key.clone() });
            self.execute(&action).await
        })
    }

    fn key_up<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, ClientError> {
        Box::pin(async move {
            let action = Action::from(KeyUp { key: key.clone() });
            self.execute(&action).await
        })
    }

    fn mouse_move(&self, x: i32, y: i32, duration: Duration) -> DeviceFuture<'_, ClientError> {
        Box::pin(async move {
            let action = Action::from(MouseMove { x, y, duration });
            self.execute(&action).await
        })
    }

    fn mouse_scroll(&self, amount: f64) -> DeviceFuture<'_, ClientError> {
        Box::pin(async move {
            let action = Action::from(MouseScroll { amount });
            self.execute(&action).await
        })
    }

    fn mouse_button_down(&self, button: MouseButton) -> DeviceFuture<'_, ClientError> {
        Box::pin(async move {
            let action = Action::from(MouseButtonDown { button });
            self.execute(&action).await
        })
    }

    fn mouse_button_up(&self, button: MouseButton) -> DeviceFuture<'_, ClientError> {
        Box::pin(async move {
            let action = Action::from(MouseButtonUp { button });
            self.execute(&action).await
        })
    }
}
