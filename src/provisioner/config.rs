//! Retry and timeout policy for a [`super::Provisioner`].

use std::time::Duration;

use crate::daemon::AuthToken;

/// Daemon port used when neither the configuration nor the backend picks one.
pub const DEFAULT_DAEMON_PORT: u16 = 8000;
/// Default number of provisioning attempts.
pub const DEFAULT_MAX_PROVISIONING_RETRIES: u32 = 3;
/// Default bound handed to the backend for one provisioning attempt.
pub const DEFAULT_PROVISIONING_TIMEOUT: Duration = Duration::from_secs(900);
/// Default number of health probes.
pub const DEFAULT_MAX_HEALTH_RETRIES: u32 = 10;
/// Default overall budget for the health phase.
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest pause between two health probes.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Policy applied by the provisioner. Counts below one are treated as one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionerConfig {
    /// Scheme and host of the daemon, for example `http://localhost`.
    pub daemon_base_url: String,
    /// Fixed daemon port; `None` lets the backend choose.
    pub daemon_port: Option<u16>,
    /// Fixed token; `None` generates a fresh one per provisioner.
    pub daemon_token: Option<AuthToken>,
    /// Provisioning attempts before giving up.
    pub max_provisioning_retries: u32,
    /// Bound passed to the backend for each attempt.
    pub provisioning_timeout: Duration,
    /// Health probes before giving up.
    pub max_health_retries: u32,
    /// Wall-clock budget for the health phase.
    pub health_check_timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            daemon_base_url: String::from("http://localhost"),
            daemon_port: None,
            daemon_token: None,
            max_provisioning_retries: DEFAULT_MAX_PROVISIONING_RETRIES,
            provisioning_timeout: DEFAULT_PROVISIONING_TIMEOUT,
            max_health_retries: DEFAULT_MAX_HEALTH_RETRIES,
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
        }
    }
}

impl ProvisionerConfig {
    /// Sets the daemon base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.daemon_base_url = base_url.into();
        self
    }

    /// Pins the daemon port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.daemon_port = Some(port);
        self
    }

    /// Pins the daemon token.
    #[must_use]
    pub fn with_token(mut self, token: AuthToken) -> Self {
        self.daemon_token = Some(token);
        self
    }

    /// Sets the number of provisioning attempts.
    #[must_use]
    pub const fn with_max_provisioning_retries(mut self, retries: u32) -> Self {
        self.max_provisioning_retries = retries;
        self
    }

    /// Sets the per-attempt provisioning bound.
    #[must_use]
    pub const fn with_provisioning_timeout(mut self, timeout: Duration) -> Self {
        self.provisioning_timeout = timeout;
        self
    }

    /// Sets the number of health probes.
    #[must_use]
    pub const fn with_max_health_retries(mut self, retries: u32) -> Self {
        self.max_health_retries = retries;
        self
    }

    /// Sets the health phase budget.
    #[must_use]
    pub const fn with_health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }
}

/// Pause after failed provisioning attempt `attempt` (1-based): `2^attempt`
/// seconds.
#[must_use]
pub const fn provisioning_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2_u64.saturating_pow(attempt))
}
