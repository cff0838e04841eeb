//! Backend abstraction for creating and destroying the resource that hosts
//! the control daemon.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::daemon::AuthToken;

/// Parameters handed to a backend for one provisioning attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// Port the daemon must listen on.
    pub port: u16,
    /// Token the daemon must accept.
    pub token: AuthToken,
    /// Upper bound on how long the backend may wait for its resource.
    pub timeout: Duration,
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Interface implemented by anything that can host a daemon: a container,
/// a virtual machine, or an operator-managed host.
pub trait Backend: Send + Sync {
    /// Backend specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates the resource and starts the daemon with the requested port and
    /// token. Called once per attempt; the provisioner retries on failure.
    fn provision<'a>(
        &'a mut self,
        request: &'a ProvisionRequest,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Destroys the resource. Must succeed when nothing was provisioned.
    fn deprovision(&mut self) -> BackendFuture<'_, (), Self::Error>;

    /// Cheap liveness query against the backend's own control plane. Must
    /// not contact the daemon.
    fn is_running(&self) -> BackendFuture<'_, bool, Self::Error>;

    /// Port the backend would like the daemon to use when none is
    /// configured.
    fn preferred_port(&self) -> Option<u16> {
        None
    }
}
