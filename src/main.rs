//! Binary entry point for the Marionette CLI.

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::Parser;
use shell_escape::unix::escape;
use thiserror::Error;

use marionette::provisioner::DEFAULT_DAEMON_PORT;
use marionette::{
    AuthToken, Backend, ClientError, Computer, ComputerConfig, ComputerError, DaemonClient,
    DaemonEndpoint, DockerConfig, DockerDriver, HealthProbe, HttpHealthProbe, ManualDriver,
    Operation, ProvisionerState, ScreenshotFormat, action::ShellCommand, logging,
};

mod cli;

use cli::{Cli, RunCommand, ScreenshotCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("daemon at {0} is not healthy")]
    Unhealthy(String),
    #[error("daemon error: {0}")]
    Daemon(#[from] ClientError),
    #[error("failed to start the daemon: {0}")]
    Provision(String),
    #[error("daemon returned no image bytes for a local file")]
    NoImageBytes,
    #[error("failed to write {path}: {message}")]
    Output { path: String, message: String },
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
}

impl From<ComputerError> for CliError {
    fn from(value: ComputerError) -> Self {
        match value {
            ComputerError::Client(err) => Self::Daemon(err),
            ComputerError::NotStarted => Self::Provision(ComputerError::NotStarted.to_string()),
        }
    }
}

#[tokio::main]
async fn main() {
    logging::init();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let config =
        ComputerConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    match cli {
        Cli::Health => health(&config).await,
        Cli::Screenshot(args) => screenshot(&config, &args).await,
        Cli::Run(args) => run_command(&config, &args).await,
    }
}

fn configured_endpoint(config: &ComputerConfig) -> Result<DaemonEndpoint, CliError> {
    let token = config.token().ok_or_else(|| {
        CliError::Config(String::from(
            "missing daemon token: set MARIONETTE_DAEMON_TOKEN or add daemon_token to marionette.toml",
        ))
    })?;
    Ok(DaemonEndpoint::new(
        config.daemon_base_url.clone(),
        config.daemon_port.unwrap_or(DEFAULT_DAEMON_PORT),
        token,
    ))
}

async fn health(config: &ComputerConfig) -> Result<i32, CliError> {
    let endpoint = DaemonEndpoint::new(
        config.daemon_base_url.clone(),
        config.daemon_port.unwrap_or(DEFAULT_DAEMON_PORT),
        config.token().unwrap_or_else(AuthToken::generate),
    );
    if !HttpHealthProbe::new().is_responsive(&endpoint).await {
        return Err(CliError::Unhealthy(endpoint.url()));
    }
    writeln!(io::stdout(), "daemon at {} is healthy", endpoint.url()).ok();
    Ok(0)
}

async fn screenshot(config: &ComputerConfig, args: &ScreenshotCommand) -> Result<i32, CliError> {
    let client = DaemonClient::new(configured_endpoint(config)?, config.request_timeout());
    let image = client
        .screenshot(args.display, ScreenshotFormat::Bytes)
        .await?
        .to_bytes()
        .map_err(|err| ClientError::Transport {
            operation: Operation::Screenshot.name(),
            status: None,
            message: err.to_string(),
        })?
        .ok_or(CliError::NoImageBytes)?;
    write_file(Utf8Path::new(&args.output), &image)?;
    writeln!(io::stdout(), "wrote {} bytes to {}", image.len(), args.output).ok();
    Ok(0)
}

fn write_file(path: &Utf8Path, bytes: &[u8]) -> Result<(), CliError> {
    let output_error = |message: String| CliError::Output {
        path: path.to_string(),
        message,
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| output_error(String::from("path has no file name")))?;
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| output_error(err.to_string()))?;
    dir.write(file_name, bytes)
        .map_err(|err| output_error(err.to_string()))
}

async fn run_command(config: &ComputerConfig, args: &RunCommand) -> Result<i32, CliError> {
    validate_command_args(&args.command)?;
    let mut command = ShellCommand::new(render_command(&args.command));
    if let Some(seconds) = args.timeout {
        command = command.with_timeout(Duration::from_secs(seconds));
    }

    let mut policy = config
        .provisioner_config()
        .map_err(|err| CliError::Config(err.to_string()))?;
    if args.docker {
        let docker =
            DockerConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
        let driver = DockerDriver::new(docker).map_err(|err| CliError::Config(err.to_string()))?;
        run_on(Computer::new(driver, policy), config, &command).await
    } else {
        if policy.daemon_token.is_none() {
            return Err(CliError::Config(String::from(
                "an operator-launched daemon needs a known token: set MARIONETTE_DAEMON_TOKEN",
            )));
        }
        if policy.daemon_port.is_none() {
            policy.daemon_port = Some(DEFAULT_DAEMON_PORT);
        }
        run_on(Computer::new(ManualDriver::new(), policy), config, &command).await
    }
}

async fn run_on<B: Backend>(
    mut computer: Computer<B>,
    config: &ComputerConfig,
    command: &ShellCommand,
) -> Result<i32, CliError> {
    computer = computer.with_request_timeout(config.request_timeout());
    if let Err(err) = computer.start().await {
        computer.stop().await;
        return Err(CliError::Provision(err.to_string()));
    }

    let outcome = computer.shell(command).await;
    computer.stop().await;
    if computer.state() == ProvisionerState::TeardownError {
        let message = computer
            .provisioner()
            .last_teardown_error()
            .unwrap_or("unknown error");
        writeln!(io::stderr(), "warning: teardown failed: {message}").ok();
    }

    match outcome {
        Ok(()) => Ok(0),
        Err(ComputerError::Client(ClientError::Rejected { .. })) => {
            writeln!(io::stderr(), "command reported failure").ok();
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}

fn render_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
