//! Core library for Marionette, a remote keyboard, mouse, and shell driver.
//!
//! A [`Provisioner`] brings up a resource that hosts the control daemon
//! through a [`Backend`], waits for the daemon to report healthy, and tears
//! the resource down afterwards. A [`DaemonClient`] speaks the daemon's
//! bearer-authenticated HTTP protocol, and [`Computer`] joins the two into a
//! session that can perform any [`Action`].

pub mod action;
pub mod backend;
pub mod computer;
pub mod config;
pub mod daemon;
pub mod device;
pub mod drivers;
pub mod logging;
pub mod observation;
pub mod process;
pub mod provisioner;
pub mod test_support;

pub use action::{Action, ActionError, Key, MouseButton};
pub use backend::{Backend, BackendFuture, ProvisionRequest};
pub use computer::{Computer, ComputerError, ObservationKind};
pub use config::{ComputerConfig, ConfigError, DockerConfig};
pub use daemon::{AuthToken, ClientError, DaemonClient, DaemonEndpoint, Operation};
pub use device::InputDevice;
pub use drivers::{DockerDriver, DockerError, ManualDriver};
pub use observation::{
    KeyboardState, MouseState, Observation, ObservationError, Screenshot, ScreenshotFormat,
};
pub use process::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use provisioner::{
    HealthProbe, HttpHealthProbe, Provisioner, ProvisionerConfig, ProvisionerError,
    ProvisionerState,
};
