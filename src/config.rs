//! Configuration loading via `ortho-config`.
//!
//! Settings merge defaults, `marionette.toml`, and `MARIONETTE_*` environment
//! variables, in that order of precedence.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::daemon::AuthToken;
use crate::provisioner::ProvisionerConfig;

/// Settings for reaching and supervising the daemon.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "MARIONETTE",
    discovery(
        app_name = "marionette",
        env_var = "MARIONETTE_CONFIG_PATH",
        config_file_name = "marionette.toml",
        dotfile_name = ".marionette.toml",
        project_file_name = "marionette.toml"
    )
)]
pub struct ComputerConfig {
    /// Scheme and host of the daemon.
    #[ortho_config(default = "http://localhost".to_owned())]
    pub daemon_base_url: String,
    /// Fixed daemon port. Unset lets the backend choose, falling back to
    /// 8000.
    pub daemon_port: Option<u16>,
    /// Fixed bearer token. Unset generates one per session.
    pub daemon_token: Option<String>,
    /// Provisioning attempts before giving up.
    #[ortho_config(default = 3)]
    pub max_provisioning_retries: u32,
    /// Bound handed to the backend for each provisioning attempt.
    #[ortho_config(default = 900)]
    pub provisioning_timeout_secs: u64,
    /// Health probes before giving up.
    #[ortho_config(default = 10)]
    pub max_health_retries: u32,
    /// Wall-clock budget for the health phase.
    #[ortho_config(default = 60)]
    pub health_check_timeout_secs: u64,
    /// Per-request timeout for daemon calls.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
}

/// Settings for the Docker driver.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "MARIONETTE_DOCKER",
    discovery(
        app_name = "marionette",
        env_var = "MARIONETTE_CONFIG_PATH",
        config_file_name = "marionette.toml",
        dotfile_name = ".marionette.toml",
        project_file_name = "marionette.toml"
    )
)]
pub struct DockerConfig {
    /// Docker CLI executable.
    #[ortho_config(default = "docker".to_owned())]
    pub bin: String,
    /// Image that starts the daemon, reading `DAEMON_PORT` and
    /// `DAEMON_TOKEN` from its environment.
    #[ortho_config(default = "marionette-daemon:latest".to_owned())]
    pub image: String,
    /// Prefix for generated container names.
    #[ortho_config(default = "marionette".to_owned())]
    pub container_prefix: String,
    /// Pause between container state polls.
    #[ortho_config(default = 2)]
    pub poll_interval_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to marionette.toml",
            self.description, self.env_var, self.toml_key
        ))
    }

    fn zero(&self) -> ConfigError {
        ConfigError::Invalid(format!(
            "{} must be at least 1: check {} or {} in marionette.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

fn require_text(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(metadata.zero());
    }
    Ok(())
}

impl ComputerConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("marionette")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for an empty base URL and
    /// [`ConfigError::Invalid`] for a malformed URL or any zero count or
    /// timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_text(
            &self.daemon_base_url,
            &FieldMetadata::new(
                "daemon base URL",
                "MARIONETTE_DAEMON_BASE_URL",
                "daemon_base_url",
            ),
        )?;
        if !(self.daemon_base_url.starts_with("http://")
            || self.daemon_base_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "daemon base URL must start with http:// or https://, got {}",
                self.daemon_base_url
            )));
        }
        if self.daemon_port == Some(0) {
            return Err(ConfigError::Invalid(String::from(
                "daemon port must be between 1 and 65535: check MARIONETTE_DAEMON_PORT",
            )));
        }
        require_positive(
            u64::from(self.max_provisioning_retries),
            &FieldMetadata::new(
                "max provisioning retries",
                "MARIONETTE_MAX_PROVISIONING_RETRIES",
                "max_provisioning_retries",
            ),
        )?;
        require_positive(
            self.provisioning_timeout_secs,
            &FieldMetadata::new(
                "provisioning timeout",
                "MARIONETTE_PROVISIONING_TIMEOUT_SECS",
                "provisioning_timeout_secs",
            ),
        )?;
        require_positive(
            u64::from(self.max_health_retries),
            &FieldMetadata::new(
                "max health retries",
                "MARIONETTE_MAX_HEALTH_RETRIES",
                "max_health_retries",
            ),
        )?;
        require_positive(
            self.health_check_timeout_secs,
            &FieldMetadata::new(
                "health check timeout",
                "MARIONETTE_HEALTH_CHECK_TIMEOUT_SECS",
                "health_check_timeout_secs",
            ),
        )?;
        require_positive(
            self.request_timeout_secs,
            &FieldMetadata::new(
                "request timeout",
                "MARIONETTE_REQUEST_TIMEOUT_SECS",
                "request_timeout_secs",
            ),
        )
    }

    /// Validates and converts into the provisioner's policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn provisioner_config(&self) -> Result<ProvisionerConfig, ConfigError> {
        self.validate()?;
        Ok(ProvisionerConfig {
            daemon_base_url: self.daemon_base_url.clone(),
            daemon_port: self.daemon_port,
            daemon_token: self.token(),
            max_provisioning_retries: self.max_provisioning_retries,
            provisioning_timeout: Duration::from_secs(self.provisioning_timeout_secs),
            max_health_retries: self.max_health_retries,
            health_check_timeout: Duration::from_secs(self.health_check_timeout_secs),
        })
    }

    /// Configured token, ignoring blank values.
    #[must_use]
    pub fn token(&self) -> Option<AuthToken> {
        self.daemon_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(AuthToken::new)
    }

    /// Per-request timeout for daemon calls.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DockerConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("marionette")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required field is empty or the poll
    /// interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_text(
            &self.bin,
            &FieldMetadata::new("Docker executable", "MARIONETTE_DOCKER_BIN", "bin"),
        )?;
        require_text(
            &self.image,
            &FieldMetadata::new("daemon image", "MARIONETTE_DOCKER_IMAGE", "image"),
        )?;
        require_text(
            &self.container_prefix,
            &FieldMetadata::new(
                "container name prefix",
                "MARIONETTE_DOCKER_CONTAINER_PREFIX",
                "container_prefix",
            ),
        )?;
        require_positive(
            self.poll_interval_secs,
            &FieldMetadata::new(
                "container poll interval",
                "MARIONETTE_DOCKER_POLL_INTERVAL_SECS",
                "poll_interval_secs",
            ),
        )
    }

    /// Pause between container state polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for ComputerConfig {
    fn default() -> Self {
        Self {
            daemon_base_url: String::from("http://localhost"),
            daemon_port: None,
            daemon_token: None,
            max_provisioning_retries: 3,
            provisioning_timeout_secs: 900,
            max_health_retries: 10,
            health_check_timeout_secs: 60,
            request_timeout_secs: 30,
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            bin: String::from("docker"),
            image: String::from("marionette-daemon:latest"),
            container_prefix: String::from("marionette"),
            poll_interval_secs: 2,
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
