//! Client side of the daemon's HTTP RPC protocol.
//!
//! The daemon runs inside the provisioned resource and exposes health,
//! observation, and execution routes. Every call carries the bearer token
//! minted during provisioning.

mod auth;
mod client;
mod endpoint;
mod error;
mod protocol;

pub use auth::{AuthToken, GENERATED_TOKEN_LEN};
pub use client::{DEFAULT_REQUEST_TIMEOUT, DaemonClient};
pub use endpoint::DaemonEndpoint;
pub use error::ClientError;
pub use protocol::Operation;
pub(crate) use protocol::HealthResponse;
