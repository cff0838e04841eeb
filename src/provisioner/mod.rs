//! Lifecycle state machine that brings a daemon up and tears it down.
//!
//! `setup` runs two phases. Provisioning asks the backend to create the
//! resource, retrying with `2^attempt` second backoff. Health checking then
//! polls the backend's liveness and the daemon's `/health` route until both
//! pass, the probe count runs out, or the wall-clock budget is spent.
//! `teardown` never fails; backend errors are recorded in the
//! `TeardownError` state instead.
//!
//! All waits use `tokio::time`, so tests drive the state machine on a paused
//! clock.

mod config;
mod error;
mod health;
mod state;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::backend::{Backend, ProvisionRequest};
use crate::daemon::{AuthToken, DaemonEndpoint};

pub use config::{
    DEFAULT_DAEMON_PORT, DEFAULT_HEALTH_CHECK_TIMEOUT, DEFAULT_MAX_HEALTH_RETRIES,
    DEFAULT_MAX_PROVISIONING_RETRIES, DEFAULT_PROVISIONING_TIMEOUT, HEALTH_POLL_INTERVAL,
    ProvisionerConfig, provisioning_backoff,
};
pub use error::ProvisionerError;
pub use health::{
    HEALTH_REQUEST_TIMEOUT, HealthFailure, HealthOutcome, HealthProbe, HttpHealthProbe,
    ProbeFuture,
};
pub use state::ProvisionerState;

use health::{HealthStep, next_health_step};

/// Drives one backend through the provisioning lifecycle.
#[derive(Debug)]
pub struct Provisioner<B, P = HttpHealthProbe> {
    backend: B,
    probe: P,
    config: ProvisionerConfig,
    token: AuthToken,
    port: Option<u16>,
    state: ProvisionerState,
    last_teardown_error: Option<String>,
}

impl<B: Backend> Provisioner<B> {
    /// Creates a provisioner that probes the daemon over HTTP.
    #[must_use]
    pub fn new(backend: B, config: ProvisionerConfig) -> Self {
        Self::with_probe(backend, HttpHealthProbe::new(), config)
    }
}

impl<B: Backend, P: HealthProbe> Provisioner<B, P> {
    /// Creates a provisioner with a custom health probe.
    ///
    /// The token comes from the configuration or is generated here, so it is
    /// fixed for the provisioner's lifetime.
    #[must_use]
    pub fn with_probe(backend: B, probe: P, config: ProvisionerConfig) -> Self {
        let token = config
            .daemon_token
            .clone()
            .unwrap_or_else(AuthToken::generate);
        Self {
            backend,
            probe,
            config,
            token,
            port: None,
            state: ProvisionerState::NotStarted,
            last_teardown_error: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ProvisionerState {
        self.state
    }

    /// Token the daemon is started with.
    #[must_use]
    pub const fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Daemon port, once resolved by `setup`.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Backend driven by this provisioner.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Policy in effect.
    #[must_use]
    pub const fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Endpoint of the daemon, once its port is known.
    #[must_use]
    pub fn endpoint(&self) -> Option<DaemonEndpoint> {
        self.port.map(|port| {
            DaemonEndpoint::new(
                self.config.daemon_base_url.clone(),
                port,
                self.token.clone(),
            )
        })
    }

    /// Root URL of the daemon, once its port is known.
    #[must_use]
    pub fn daemon_url(&self) -> Option<String> {
        self.endpoint().map(|endpoint| endpoint.url())
    }

    /// Message of the most recent failed teardown.
    #[must_use]
    pub fn last_teardown_error(&self) -> Option<&str> {
        self.last_teardown_error.as_deref()
    }

    /// Provisions the resource and waits for the daemon to become healthy.
    ///
    /// On success the state is `Running`. From an error state or `Stopped`,
    /// a new lifecycle starts at `NotStarted`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionerError::InvalidState`] while a lifecycle is
    /// active, [`ProvisionerError::Provisioning`] once every attempt fails
    /// (state `SetupError`), and the health variants when the daemon does not
    /// become healthy (state `HealthCheckError`).
    pub async fn setup(&mut self) -> Result<(), ProvisionerError<B::Error>> {
        if self.state.is_active() {
            return Err(ProvisionerError::InvalidState { state: self.state });
        }
        if self.state != ProvisionerState::NotStarted {
            self.transition(ProvisionerState::NotStarted);
        }

        let port = self.resolve_port();
        self.port = Some(port);
        let request = ProvisionRequest {
            port,
            token: self.token.clone(),
            timeout: self.config.provisioning_timeout,
        };

        self.transition(ProvisionerState::Provisioning);
        self.provision_with_retries(&request).await?;
        self.transition(ProvisionerState::HealthChecking);
        self.wait_until_healthy().await
    }

    /// Destroys the resource. Never fails: a backend error moves the state
    /// to `TeardownError` and is kept in [`Self::last_teardown_error`].
    pub async fn teardown(&mut self) {
        self.transition(ProvisionerState::Stopping);
        match self.backend.deprovision().await {
            Ok(()) => {
                self.last_teardown_error = None;
                self.transition(ProvisionerState::Stopped);
            }
            Err(err) => {
                warn!(error = %err, "teardown failed; resource may still exist");
                self.last_teardown_error = Some(err.to_string());
                self.transition(ProvisionerState::TeardownError);
            }
        }
    }

    /// Backend liveness. Backend errors count as not running.
    pub async fn is_running(&self) -> bool {
        match self.backend.is_running().await {
            Ok(running) => running,
            Err(err) => {
                warn!(error = %err, "backend liveness query failed");
                false
            }
        }
    }

    /// Whether the daemon answers its health route. `false` before a port
    /// is resolved.
    pub async fn is_daemon_responsive(&self) -> bool {
        let Some(endpoint) = self.endpoint() else {
            return false;
        };
        self.probe.is_responsive(&endpoint).await
    }

    /// One health attempt: backend liveness first, then the daemon probe.
    pub async fn check_health(&self) -> HealthOutcome {
        if !self.is_running().await {
            return HealthOutcome::Retry(HealthFailure::NotRunning);
        }
        if !self.is_daemon_responsive().await {
            return HealthOutcome::Retry(HealthFailure::Unresponsive);
        }
        HealthOutcome::Ready
    }

    fn resolve_port(&self) -> u16 {
        self.config
            .daemon_port
            .or_else(|| self.backend.preferred_port())
            .unwrap_or(DEFAULT_DAEMON_PORT)
    }

    async fn provision_with_retries(
        &mut self,
        request: &ProvisionRequest,
    ) -> Result<(), ProvisionerError<B::Error>> {
        let max_attempts = self.config.max_provisioning_retries.max(1);
        let mut attempt = 1;
        loop {
            info!(attempt, max_attempts, port = request.port, "provisioning daemon host");
            let Err(err) = self.backend.provision(request).await else {
                return Ok(());
            };
            if attempt >= max_attempts {
                warn!(attempt, error = %err, "provisioning failed; giving up");
                self.transition(ProvisionerState::SetupError);
                return Err(ProvisionerError::Provisioning {
                    attempts: attempt,
                    source: err,
                });
            }
            let backoff = provisioning_backoff(attempt);
            warn!(
                attempt,
                max_attempts,
                backoff_secs = backoff.as_secs(),
                error = %err,
                "provisioning failed; retrying"
            );
            sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn wait_until_healthy(&mut self) -> Result<(), ProvisionerError<B::Error>> {
        let budget = self.config.health_check_timeout;
        let max_attempts = self.config.max_health_retries.max(1);
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.check_health().await {
                HealthOutcome::Ready => {
                    info!(attempt, elapsed = ?started.elapsed(), "daemon is healthy");
                    self.transition(ProvisionerState::Running);
                    return Ok(());
                }
                HealthOutcome::Retry(failure) => failure,
            };
            let elapsed = started.elapsed();
            match next_health_step(attempt, max_attempts, elapsed, budget, HEALTH_POLL_INTERVAL) {
                HealthStep::Wait(delay) => {
                    debug!(attempt, %failure, ?delay, "daemon not ready; waiting");
                    sleep(delay).await;
                }
                HealthStep::TimedOut => {
                    warn!(attempt, ?elapsed, ?budget, "health check timed out");
                    self.transition(ProvisionerState::HealthCheckError);
                    return Err(ProvisionerError::HealthCheckTimeout { elapsed, budget });
                }
                HealthStep::Exhausted => {
                    warn!(attempt, %failure, "health check retries exhausted");
                    self.transition(ProvisionerState::HealthCheckError);
                    return Err(ProvisionerError::HealthCheckRetriesExhausted {
                        attempts: attempt,
                        last_failure: failure,
                    });
                }
            }
        }
    }

    fn transition(&mut self, next: ProvisionerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        info!(from = %self.state, to = %next, "provisioner state changed");
        self.state = next;
    }
}
