//! Session facade: one provisioned daemon plus the client that drives it.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::action::{Action, Key, MouseButton, ShellCommand};
use crate::backend::Backend;
use crate::daemon::{ClientError, DEFAULT_REQUEST_TIMEOUT, DaemonClient};
use crate::device::{DeviceFuture, InputDevice};
use crate::observation::{KeyboardState, MouseState, Observation, Screenshot, ScreenshotFormat};
use crate::provisioner::{
    HealthProbe, HttpHealthProbe, Provisioner, ProvisionerConfig, ProvisionerError,
    ProvisionerState,
};

/// Errors raised by session operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ComputerError {
    /// Raised when an operation is attempted before `start` succeeded or
    /// after `stop`.
    #[error("computer is not started")]
    NotStarted,
    /// Raised when the daemon call fails.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Which observation [`Computer::observe`] should fetch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObservationKind {
    /// A screenshot of one display.
    Screenshot {
        /// Display index.
        display_id: u32,
        /// Requested representation.
        format: ScreenshotFormat,
    },
    /// Pointer position and buttons.
    MouseState,
    /// Held keys.
    KeyboardState,
}

/// A remotely controlled machine.
///
/// `start` provisions the daemon host and opens a client; `stop` tears the
/// host down. Keyboard and mouse gestures come from [`InputDevice`], so
/// composites such as clicks are issued as primitive daemon calls.
#[derive(Debug)]
pub struct Computer<B, P = HttpHealthProbe> {
    provisioner: Provisioner<B, P>,
    request_timeout: Duration,
    client: Option<DaemonClient>,
}

impl<B: Backend> Computer<B> {
    /// Creates a computer that probes its daemon over HTTP.
    #[must_use]
    pub fn new(backend: B, config: ProvisionerConfig) -> Self {
        Self::with_provisioner(Provisioner::new(backend, config))
    }
}

impl<B: Backend, P: HealthProbe> Computer<B, P> {
    /// Wraps an existing provisioner.
    #[must_use]
    pub const fn with_provisioner(provisioner: Provisioner<B, P>) -> Self {
        Self {
            provisioner,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client: None,
        }
    }

    /// Overrides the per-request timeout used once started.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Lifecycle state of the underlying provisioner.
    #[must_use]
    pub const fn state(&self) -> ProvisionerState {
        self.provisioner.state()
    }

    /// Underlying provisioner.
    #[must_use]
    pub const fn provisioner(&self) -> &Provisioner<B, P> {
        &self.provisioner
    }

    /// Client for the running daemon.
    ///
    /// # Errors
    ///
    /// Returns [`ComputerError::NotStarted`] outside a started session.
    pub fn client(&self) -> Result<&DaemonClient, ComputerError> {
        self.client.as_ref().ok_or(ComputerError::NotStarted)
    }

    /// Provisions the daemon host and connects to it.
    ///
    /// # Errors
    ///
    /// Returns the provisioner's error when setup fails; the session stays
    /// unstarted.
    pub async fn start(&mut self) -> Result<(), ProvisionerError<B::Error>> {
        self.client = None;
        self.provisioner.setup().await?;
        let endpoint = self
            .provisioner
            .endpoint()
            .ok_or_else(|| ProvisionerError::InvalidState {
                state: self.provisioner.state(),
            })?;
        info!(daemon = %endpoint.url(), "computer started");
        self.client = Some(DaemonClient::new(endpoint, self.request_timeout));
        Ok(())
    }

    /// Drops the client and tears the daemon host down. Teardown failures
    /// are visible through [`Self::state`].
    pub async fn stop(&mut self) {
        self.client = None;
        self.provisioner.teardown().await;
        info!(state = %self.provisioner.state(), "computer stopped");
    }

    /// Captures one display.
    ///
    /// # Errors
    ///
    /// Returns [`ComputerError`] when not started or the call fails.
    pub async fn screenshot(
        &self,
        display_id: u32,
        format: ScreenshotFormat,
    ) -> Result<Screenshot, ComputerError> {
        let client = self.client()?;
        client.screenshot(display_id, format).await.map_err(ComputerError::from)
    }

    /// Reads the pointer state.
    ///
    /// # Errors
    ///
    /// Returns [`ComputerError`] when not started or the call fails.
    pub async fn mouse_state(&self) -> Result<MouseState, ComputerError> {
        let client = self.client()?;
        client.mouse_state().await.map_err(ComputerError::from)
    }

    /// Reads the keyboard state.
    ///
    /// # Errors
    ///
    /// Returns [`ComputerError`] when not started or the call fails.
    pub async fn keyboard_state(&self) -> Result<KeyboardState, ComputerError> {
        let client = self.client()?;
        client.keyboard_state().await.map_err(ComputerError::from)
    }

    /// Fetches one observation.
    ///
    /// # Errors
    ///
    /// Returns [`ComputerError`] when not started or the call fails.
    pub async fn observe(&self, kind: ObservationKind) -> Result<Observation, ComputerError> {
        match kind {
            ObservationKind::Screenshot { display_id, format } => self
                .screenshot(display_id, format)
                .await
                .map(Observation::Screenshot),
            ObservationKind::MouseState => self.mouse_state().await.map(Observation::MouseState),
            ObservationKind::KeyboardState => {
                self.keyboard_state().await.map(Observation::KeyboardState)
            }
        }
    }

    /// Runs a shell command on the daemon host.
    ///
    /// # Errors
    ///
    /// Returns [`ComputerError`] when not started or the call fails.
    pub async fn shell(&self, command: &ShellCommand) -> Result<(), ComputerError> {
        let client = self.client()?;
        client.shell(command).await.map_err(ComputerError::from)
    }

    /// Performs any action: primitives and shell commands as single calls,
    /// gestures through their primitive sequences.
    ///
    /// # Errors
    ///
    /// Returns [`ComputerError`] when not started, the action is invalid, or
    /// a call fails. Gestures report the first failing step.
    pub async fn perform(&self, action: &Action) -> Result<(), ComputerError> {
        action.validate().map_err(ClientError::from)?;
        match action {
            Action::KeyDown(down) => self.key_down(&down.key).await,
            Action::KeyUp(up) => self.key_up(&up.key).await,
            Action::KeyPress(press) => self.key_press(&press.key, press.duration).await,
            Action::KeysDown(keys) => self.keys_down(&keys.keys).await,
            Action::KeysRelease(keys) => self.keys_release(&keys.keys).await,
            Action::Hotkey(hotkey) => self.hotkey(&hotkey.keys).await,
            Action::TypeText(typed) => self.type_text(&typed.text).await,
            Action::MouseMove(motion) => self.mouse_move(motion.x, motion.y, motion.duration).await,
            Action::MouseScroll(scroll) => self.mouse_scroll(scroll.amount).await,
            Action::MouseButtonDown(down) => self.mouse_button_down(down.button).await,
            Action::MouseButtonUp(up) => self.mouse_button_up(up.button).await,
            Action::Click(click) => self.click(click).await,
            Action::DoubleClick(double) => self.double_click(double).await,
            Action::Drag(drag) => self.drag(drag).await,
            Action::ShellCommand(command) => self.shell(command).await,
        }
    }
}

impl<B: Backend, P: HealthProbe> InputDevice for Computer<B, P> {
    type Error = ComputerError;

    fn key_down<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, ComputerError> {
        Box::pin(async move {
            let client = self.client()?;
            client.key_down(key).await.map_err(ComputerError::from)
        })
    }

    fn key_up<'a>(&'a self, key: &'a Key) -> DeviceFuture<'a, ComputerError> {
        Box::pin(async move {
            let client = self.client()?;
            client.key_up(key).await.map_err(ComputerError::from)
        })
    }

    fn mouse_move(&self, x: i32, y: i32, duration: Duration) -> DeviceFuture<'_, ComputerError> {
        Box::pin(async move {
            let client = self.client()?;
            client.mouse_move(x, y, duration).await.map_err(ComputerError::from)
        })
    }

    fn mouse_scroll(&self, amount: f64) -> DeviceFuture<'_, ComputerError> {
        Box::pin(async move {
            let client = self.client()?;
            client.mouse_scroll(amount).await.map_err(ComputerError::from)
        })
    }

    fn mouse_button_down(&self, button: MouseButton) -> DeviceFuture<'_, ComputerError> {
        Box::pin(async move {
            let client = self.client()?;
            client.mouse_button_down(button).await.map_err(ComputerError::from)
        })
    }

    fn mouse_button_up(&self, button: MouseButton) -> DeviceFuture<'_, ComputerError> {
        Box::pin(async move {
            let client = self.client()?;
            client.mouse_button_up(button).await.map_err(ComputerError::from)
        })
    }
}
