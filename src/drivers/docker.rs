//! Backend that runs the daemon in a local Docker container.

use std::ffi::OsString;
use std::net::TcpListener;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendFuture, ProvisionRequest};
use crate::config::{ConfigError, DockerConfig};
use crate::process::{CommandOutput, CommandRunner, ProcessCommandRunner, SpawnError};

/// Errors raised by [`DockerDriver`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum DockerError {
    /// Raised when the driver configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raised when the Docker CLI cannot be started.
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// Raised when a Docker CLI call exits unsuccessfully.
    #[error("docker {action} exited with {status}: {stderr}")]
    CommandFailed {
        /// Docker subcommand that failed.
        action: &'static str,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Raised when the container does not report running in time.
    #[error("container {container} was not running after {timeout:?}")]
    Timeout {
        /// Container name.
        container: String,
        /// Bound that elapsed.
        timeout: Duration,
    },
}

/// Runs the daemon image with `docker run`, publishing the daemon port and
/// passing `DAEMON_PORT` and `DAEMON_TOKEN` to the container.
#[derive(Debug)]
pub struct DockerDriver<R = ProcessCommandRunner> {
    config: DockerConfig,
    runner: R,
    container: Option<String>,
}

impl DockerDriver {
    /// Creates a driver that shells out to the Docker CLI.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::Config`] when the configuration is invalid.
    pub fn new(config: DockerConfig) -> Result<Self, DockerError> {
        Self::with_runner(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> DockerDriver<R> {
    /// Creates a driver with a custom command runner.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::Config`] when the configuration is invalid.
    pub fn with_runner(config: DockerConfig, runner: R) -> Result<Self, DockerError> {
        config.validate()?;
        Ok(Self {
            config,
            runner,
            container: None,
        })
    }

    /// Name of the managed container, if one exists.
    #[must_use]
    pub fn container_name(&self) -> Option<&str> {
        self.container.as_deref()
    }

    fn docker(&self, action: &'static str, args: &[OsString]) -> Result<CommandOutput, DockerError> {
        let output = self.runner.run(&self.config.bin, args)?;
        if output.is_success() {
            return Ok(output);
        }
        Err(DockerError::CommandFailed {
            action,
            status: output
                .code
                .map_or_else(|| String::from("no exit code"), |code| format!("status {code}")),
            stderr: output.stderr.trim().to_owned(),
        })
    }

    fn run_args(&self, name: &str, request: &ProvisionRequest) -> Vec<OsString> {
        let port = request.port;
        vec![
            OsString::from("run"),
            OsString::from("-d"),
            OsString::from("--name"),
            OsString::from(name),
            OsString::from("-p"),
            OsString::from(format!("{port}:{port}")),
            OsString::from("-e"),
            OsString::from(format!("DAEMON_PORT={port}")),
            OsString::from("-e"),
            OsString::from(format!("DAEMON_TOKEN={}", request.token.expose())),
            OsString::from(&self.config.image),
        ]
    }

    fn inspect_running(&self, name: &str) -> Result<bool, DockerError> {
        let args = [
            OsString::from("inspect"),
            OsString::from("-f"),
            OsString::from("{{.State.Running}}"),
            OsString::from(name),
        ];
        let output = self.runner.run(&self.config.bin, &args)?;
        Ok(output.is_success() && output.stdout.trim() == "true")
    }

    async fn wait_until_running(&self, name: &str, timeout: Duration) -> Result<(), DockerError> {
        let deadline = Instant::now() + timeout;
        while Instant::now() <= deadline {
            if self.inspect_running(name)? {
                return Ok(());
            }
            sleep(self.config.poll_interval()).await;
        }
        Err(DockerError::Timeout {
            container: name.to_owned(),
            timeout,
        })
    }

    fn force_remove(&self, name: &str) -> Result<(), DockerError> {
        let args = [OsString::from("rm"), OsString::from("-f"), OsString::from(name)];
        self.docker("rm", &args).map(|_| ())
    }

    fn discard(&self, name: &str) {
        if let Err(err) = self.force_remove(name) {
            warn!(container = name, error = %err, "failed to remove container after a failed start");
        }
    }

    /// Removes the container left by an earlier lifecycle, if any.
    fn remove_previous(&mut self) -> Result<(), DockerError> {
        let Some(name) = self.container.as_deref() else {
            return Ok(());
        };
        info!(container = name, "removing container from the previous lifecycle");
        self.force_remove(name)?;
        self.container = None;
        Ok(())
    }
}

impl<R: CommandRunner> Backend for DockerDriver<R> {
    type Error = DockerError;

    fn provision<'a>(
        &'a mut self,
        request: &'a ProvisionRequest,
    ) -> BackendFuture<'a, (), DockerError> {
        Box::pin(async move {
            self.remove_previous()?;
            let name = format!("{}-{}", self.config.container_prefix, Uuid::new_v4().simple());
            info!(container = %name, image = %self.config.image, port = request.port, "starting daemon container");
            self.docker("run", &self.run_args(&name, request))?;
            if let Err(err) = self.wait_until_running(&name, request.timeout).await {
                self.discard(&name);
                return Err(err);
            }
            self.container = Some(name);
            Ok(())
        })
    }

    fn deprovision(&mut self) -> BackendFuture<'_, (), DockerError> {
        Box::pin(async move {
            let Some(name) = self.container.clone() else {
                return Ok(());
            };
            info!(container = %name, "removing daemon container");
            if let Err(err) = self.docker("stop", &[OsString::from("stop"), OsString::from(&name)]) {
                warn!(container = %name, error = %err, "graceful stop failed; forcing removal");
            }
            self.force_remove(&name)?;
            self.container = None;
            Ok(())
        })
    }

    fn is_running(&self) -> BackendFuture<'_, bool, DockerError> {
        Box::pin(async move {
            self.container
                .as_deref()
                .map_or(Ok(false), |name| self.inspect_running(name))
        })
    }

    fn preferred_port(&self) -> Option<u16> {
        TcpListener::bind(("127.0.0.1", 0))
            .and_then(|listener| listener.local_addr())
            .map(|address| address.port())
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::AuthToken;
    use crate::test_support::ScriptedRunner;

    fn request() -> ProvisionRequest {
        ProvisionRequest {
            port: 8123,
            token: AuthToken::new("secret-token"),
            timeout: Duration::from_secs(5),
        }
    }

    fn driver(runner: &ScriptedRunner) -> DockerDriver<ScriptedRunner> {
        DockerDriver::with_runner(DockerConfig::default(), runner.clone())
            .unwrap_or_else(|err| panic!("default config should validate: {err}"))
    }

    #[tokio::test(start_paused = true)]
    async fn provision_runs_the_image_and_waits_for_it() {
        let runner = ScriptedRunner::new();
        runner.push_output(Some(0), "abc123\n", "");
        runner.push_output(Some(0), "false\n", "");
        runner.push_output(Some(0), "true\n", "");
        let mut subject = driver(&runner);

        let result = subject.provision(&request()).await;

        assert_eq!(result, Ok(()));
        let name = subject
            .container_name()
            .unwrap_or_else(|| panic!("container should be recorded"))
            .to_owned();
        assert!(name.starts_with("marionette-"));
        let commands: Vec<String> = runner
            .invocations()
            .iter()
            .map(|call| call.command_string())
            .collect();
        assert_eq!(
            commands,
            vec![
                format!(
                    "docker run -d --name {name} -p 8123:8123 -e DAEMON_PORT=8123 \
                     -e DAEMON_TOKEN=secret-token marionette-daemon:latest"
                ),
                format!("docker inspect -f {{{{.State.Running}}}} {name}"),
                format!("docker inspect -f {{{{.State.Running}}}} {name}"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_reports_stderr() {
        let runner = ScriptedRunner::new();
        runner.push_output(Some(125), "", "no such image\n");
        let mut subject = driver(&runner);

        let result = subject.provision(&request()).await;

        assert_eq!(
            result,
            Err(DockerError::CommandFailed {
                action: "run",
                status: String::from("status 125"),
                stderr: String::from("no such image"),
            })
        );
        assert_eq!(subject.container_name(), None);
        assert_eq!(runner.invocations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn container_that_never_runs_is_removed() {
        let runner = ScriptedRunner::new();
        runner.push_success();
        for _ in 0..3 {
            runner.push_output(Some(0), "false\n", "");
        }
        runner.push_success();
        let mut subject = driver(&runner);

        let result = subject.provision(&request()).await;

        assert!(matches!(result, Err(DockerError::Timeout { .. })));
        assert_eq!(subject.container_name(), None);
        let last = runner.invocations().last().map(|call| call.command_string());
        assert!(last.is_some_and(|command| command.starts_with("docker rm -f marionette-")));
    }

    #[tokio::test(start_paused = true)]
    async fn deprovision_stops_and_removes_once() {
        let runner = ScriptedRunner::new();
        runner.push_success();
        runner.push_output(Some(0), "true\n", "");
        runner.push_success();
        runner.push_success();
        let mut subject = driver(&runner);
        let provisioned = subject.provision(&request()).await;
        assert_eq!(provisioned, Ok(()));

        let first = subject.deprovision().await;
        let second = subject.deprovision().await;

        assert_eq!(first, Ok(()));
        assert_eq!(second, Ok(()));
        let actions: Vec<String> = runner
            .invocations()
            .iter()
            .filter_map(|call| call.args.first().map(|arg| arg.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(actions, vec!["run", "inspect", "stop", "rm"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reprovisioning_removes_the_previous_container_first() {
        let runner = ScriptedRunner::new();
        runner.push_success();
        runner.push_output(Some(0), "true\n", "");
        let mut subject = driver(&runner);
        let first_result = subject.provision(&request()).await;
        assert_eq!(first_result, Ok(()));
        let first = subject.container_name().map(str::to_owned);
        runner.push_success();
        runner.push_success();
        runner.push_output(Some(0), "true\n", "");

        let second_result = subject.provision(&request()).await;

        assert_eq!(second_result, Ok(()));
        let first = first.unwrap_or_else(|| panic!("first container should be recorded"));
        assert_ne!(subject.container_name(), Some(first.as_str()));
        let commands: Vec<String> = runner
            .invocations()
            .iter()
            .map(|call| call.command_string())
            .collect();
        assert_eq!(
            commands.get(2).map(String::as_str),
            Some(format!("docker rm -f {first}").as_str())
        );
        assert!(commands.get(3).is_some_and(|command| command.starts_with("docker run")));
    }

    #[tokio::test(start_paused = true)]
    async fn unremovable_previous_container_blocks_reprovisioning() {
        let runner = ScriptedRunner::new();
        runner.push_success();
        runner.push_output(Some(0), "true\n", "");
        let mut subject = driver(&runner);
        let provisioned = subject.provision(&request()).await;
        assert_eq!(provisioned, Ok(()));
        let first = subject.container_name().map(str::to_owned);
        runner.push_failure(1);

        let result = subject.provision(&request()).await;

        assert!(matches!(
            result,
            Err(DockerError::CommandFailed { action: "rm", .. })
        ));
        assert_eq!(subject.container_name().map(str::to_owned), first);
        assert_eq!(runner.invocations().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stop_still_force_removes_the_container() {
        let runner = ScriptedRunner::new();
        runner.push_success();
        runner.push_output(Some(0), "true\n", "");
        runner.push_failure(1);
        runner.push_success();
        let mut subject = driver(&runner);
        let provisioned = subject.provision(&request()).await;
        assert_eq!(provisioned, Ok(()));
        let name = subject.container_name().map(str::to_owned).unwrap_or_default();

        let result = subject.deprovision().await;

        assert_eq!(result, Ok(()));
        assert_eq!(subject.container_name(), None);
        let last = runner.invocations().last().map(|call| call.command_string());
        assert_eq!(last, Some(format!("docker rm -f {name}")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_removal_keeps_the_container_for_a_later_teardown() {
        let runner = ScriptedRunner::new();
        runner.push_success();
        runner.push_output(Some(0), "true\n", "");
        runner.push_success();
        runner.push_failure(1);
        runner.push_success();
        runner.push_success();
        let mut subject = driver(&runner);
        let provisioned = subject.provision(&request()).await;
        assert_eq!(provisioned, Ok(()));

        let first = subject.deprovision().await;
        assert!(matches!(
            first,
            Err(DockerError::CommandFailed { action: "rm", .. })
        ));
        assert!(subject.container_name().is_some());

        let second = subject.deprovision().await;
        assert_eq!(second, Ok(()));
        assert_eq!(subject.container_name(), None);
    }

    #[tokio::test]
    async fn nothing_is_running_before_provisioning() {
        let runner = ScriptedRunner::new();
        let subject = driver(&runner);

        assert_eq!(subject.is_running().await, Ok(false));
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn preferred_port_is_a_free_local_port() {
        let runner = ScriptedRunner::new();
        let subject = driver(&runner);

        assert!(subject.preferred_port().is_some_and(|port| port > 0));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = DockerConfig {
            poll_interval_secs: 0,
            ..DockerConfig::default()
        };
        let result = DockerDriver::with_runner(config, ScriptedRunner::new());
        assert!(matches!(result, Err(DockerError::Config(_))));
    }
}
