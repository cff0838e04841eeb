//! Errors surfaced by [`super::Provisioner::setup`].

use std::time::Duration;

use thiserror::Error;

use super::{HealthFailure, ProvisionerState};

/// Failures that leave the provisioner in an error state, generic over the
/// backend error.
#[derive(Debug, Error)]
pub enum ProvisionerError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Raised when `setup` is called while a lifecycle is already active.
    #[error("cannot start setup while {state}")]
    InvalidState {
        /// State the provisioner was in.
        state: ProvisionerState,
    },
    /// Raised when every provisioning attempt failed.
    #[error("provisioning failed after {attempts} attempt(s): {source}")]
    Provisioning {
        /// Number of attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: E,
    },
    /// Raised when the health budget ran out before the daemon was healthy.
    #[error("daemon not healthy after {elapsed:?} (budget {budget:?})")]
    HealthCheckTimeout {
        /// Time spent in the health phase.
        elapsed: Duration,
        /// Configured budget.
        budget: Duration,
    },
    /// Raised when every health probe failed within the budget.
    #[error("daemon not healthy after {attempts} probe(s): {last_failure}")]
    HealthCheckRetriesExhausted {
        /// Number of probes made.
        attempts: u32,
        /// Reason the final probe failed.
        last_failure: HealthFailure,
    },
}

impl<E> ProvisionerError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// State the provisioner is left in after this error.
    #[must_use]
    pub const fn resulting_state(&self) -> ProvisionerState {
        match self {
            Self::InvalidState { state } => *state,
            Self::Provisioning { .. } => ProvisionerState::SetupError,
            Self::HealthCheckTimeout { .. } | Self::HealthCheckRetriesExhausted { .. } => {
                ProvisionerState::HealthCheckError
            }
        }
    }
}
