//! Backend for a daemon started by an operator.

use std::convert::Infallible;

use thiserror::Error;
use tracing::info;

use crate::backend::{Backend, BackendFuture, ProvisionRequest};

/// Never raised; the manual driver has no failure modes of its own.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("manual driver error")]
pub struct ManualError(Infallible);

/// Backend for a daemon the operator launches by hand.
///
/// Provisioning logs the command to run and returns immediately; the health
/// phase then waits for the daemon to appear. The resource always counts as
/// running.
#[derive(Clone, Debug, Default)]
pub struct ManualDriver {
    launches: usize,
}

impl ManualDriver {
    /// Creates the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self { launches: 0 }
    }

    /// Number of launch instructions issued.
    #[must_use]
    pub const fn launches(&self) -> usize {
        self.launches
    }
}

impl Backend for ManualDriver {
    type Error = ManualError;

    fn provision<'a>(
        &'a mut self,
        request: &'a ProvisionRequest,
    ) -> BackendFuture<'a, (), ManualError> {
        Box::pin(async move {
            self.launches += 1;
            info!(
                port = request.port,
                "start the daemon with DAEMON_PORT={} and the session token in DAEMON_TOKEN",
                request.port
            );
            Ok(())
        })
    }

    fn deprovision(&mut self) -> BackendFuture<'_, (), ManualError> {
        Box::pin(async { Ok(()) })
    }

    fn is_running(&self) -> BackendFuture<'_, bool, ManualError> {
        Box::pin(async { Ok(true) })
    }
}
