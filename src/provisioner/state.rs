//! Lifecycle states of a provisioned daemon.

use std::fmt;

/// Where a [`super::Provisioner`] is in its lifecycle.
///
/// Transitions only follow [`ProvisionerState::can_transition_to`]. The
/// three error states are terminal for their lifecycle; a new `setup` starts
/// again from `NotStarted`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ProvisionerState {
    /// Nothing has been attempted.
    #[default]
    NotStarted,
    /// The backend is creating the resource.
    Provisioning,
    /// Waiting for the resource and daemon to report healthy.
    HealthChecking,
    /// The daemon is reachable and accepting requests.
    Running,
    /// Teardown is in progress.
    Stopping,
    /// The resource has been destroyed.
    Stopped,
    /// Provisioning failed on every attempt.
    SetupError,
    /// The daemon never became healthy.
    HealthCheckError,
    /// The backend failed to destroy the resource.
    TeardownError,
}

impl ProvisionerState {
    /// Snake case name used in logs and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Provisioning => "provisioning",
            Self::HealthChecking => "health_checking",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::SetupError => "setup_error",
            Self::HealthCheckError => "health_check_error",
            Self::TeardownError => "teardown_error",
        }
    }

    /// Returns `true` for the three failure states.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::SetupError | Self::HealthCheckError | Self::TeardownError
        )
    }

    /// Returns `true` when a lifecycle is under way and `setup` must not
    /// start another one.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Provisioning | Self::HealthChecking | Self::Running | Self::Stopping
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::Provisioning)
            | (Self::Provisioning, Self::HealthChecking | Self::SetupError)
            | (Self::HealthChecking, Self::Running | Self::HealthCheckError)
            | (Self::Stopping, Self::Stopped | Self::TeardownError)
            | (
                Self::Stopped | Self::SetupError | Self::HealthCheckError | Self::TeardownError,
                Self::NotStarted,
            ) => true,
            (_, Self::Stopping) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ProvisionerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
