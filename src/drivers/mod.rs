//! Concrete [`crate::backend::Backend`] implementations.

mod docker;
mod manual;

pub use docker::{DockerDriver, DockerError};
pub use manual::{ManualDriver, ManualError};
