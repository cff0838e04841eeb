//! Errors surfaced by [`super::DaemonClient`].

use thiserror::Error;

use crate::action::ActionError;
use crate::observation::ObservationError;

use super::Operation;

/// Failures reported by daemon calls.
///
/// `Transport` covers everything that prevented a well-formed answer: refused
/// connections, timeouts, unexpected statuses, and unreadable bodies.
/// `Validation` is the daemon rejecting the request payload. `Rejected` is a
/// well-formed answer reporting that the operation did not succeed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// Raised when the request could not complete or the reply was malformed.
    #[error("{operation} failed: {message}")]
    Transport {
        /// Stable operation name.
        operation: &'static str,
        /// HTTP status when a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
    },
    /// Raised when the daemon answers `422 Unprocessable Entity`.
    #[error("{operation} rejected the request payload: {detail}")]
    Validation {
        /// Stable operation name.
        operation: &'static str,
        /// Validation detail reported by the daemon.
        detail: String,
    },
    /// Raised when the daemon reports `success: false`.
    #[error("{operation} reported failure")]
    Rejected {
        /// Stable operation name.
        operation: &'static str,
    },
    /// Raised when an action fails local validation before any request.
    #[error("invalid action: {0}")]
    InvalidAction(#[from] ActionError),
    /// Raised when an action has no dedicated daemon route.
    #[error("{action_type} has no daemon route; perform it through an input device")]
    NoRoute {
        /// Wire tag of the action.
        action_type: &'static str,
    },
}

impl ClientError {
    pub(crate) fn transport(operation: Operation, err: &reqwest::Error) -> Self {
        Self::Transport {
            operation: operation.name(),
            status: err.status().map(|status| status.as_u16()),
            message: err.to_string(),
        }
    }

    pub(crate) fn observation(operation: Operation, err: &ObservationError) -> Self {
        Self::Transport {
            operation: operation.name(),
            status: None,
            message: err.to_string(),
        }
    }

    /// Returns `true` for connection, timeout, status, and body failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` when the daemon rejected the payload.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` when the daemon reported `success: false`.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Stable name of the failed operation, when one was attempted.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Transport { operation, .. }
            | Self::Validation { operation, .. }
            | Self::Rejected { operation } => Some(*operation),
            Self::InvalidAction(_) | Self::NoRoute { .. } => None,
        }
    }
}
