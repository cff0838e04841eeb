//! Command-line interface definitions for the `marionette` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `marionette` binary.
#[derive(Debug, Parser)]
#[command(
    name = "marionette",
    about = "Provision a control daemon and drive its keyboard, mouse, and shell",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Check whether the configured daemon answers its health route.
    #[command(name = "health", about = "Check whether the configured daemon is healthy")]
    Health,
    /// Capture a screenshot from the configured daemon.
    #[command(name = "screenshot", about = "Save a screenshot from the configured daemon")]
    Screenshot(ScreenshotCommand),
    /// Provision a daemon, run one shell command on it, and tear it down.
    #[command(
        name = "run",
        about = "Provision a daemon, run a shell command on it, and tear it down"
    )]
    Run(RunCommand),
}

/// Arguments for the `marionette screenshot` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ScreenshotCommand {
    /// File the image is written to.
    #[arg(long, short, value_name = "PATH")]
    pub(crate) output: String,
    /// Display to capture.
    #[arg(long, value_name = "INDEX", default_value_t = 0)]
    pub(crate) display: u32,
}

/// Arguments for the `marionette run` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RunCommand {
    /// Start the daemon in a local Docker container instead of waiting for
    /// an operator-launched one.
    #[arg(long)]
    pub(crate) docker: bool,
    /// Seconds the daemon may spend on the command.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) timeout: Option<u64>,
    /// Command to execute on the daemon host (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}
