//! Daemon health probing.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::daemon::{DaemonEndpoint, HealthResponse, Operation};

/// Per-probe HTTP timeout.
pub const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Future returned by [`HealthProbe::is_responsive`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Checks whether a daemon answers its health route.
pub trait HealthProbe: Send + Sync {
    /// Returns `true` only when the daemon reports itself healthy. Every
    /// failure, including transport errors, is `false`.
    fn is_responsive<'a>(&'a self, endpoint: &'a DaemonEndpoint) -> ProbeFuture<'a>;
}

/// Probe that issues `GET /health` and expects `200` with `healthy: true`.
#[derive(Clone, Debug)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    /// Creates a probe with the standard five second timeout.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "health probe client setup failed; probes have no timeout");
                reqwest::Client::new()
            });
        Self { client }
    }

    async fn probe(&self, endpoint: &DaemonEndpoint) -> bool {
        let url = endpoint.url_for(Operation::Health.path());
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(%url, error = %err, "health request failed");
                return false;
            }
        };
        if response.status() != StatusCode::OK {
            debug!(%url, status = %response.status(), "health request returned non-200");
            return false;
        }
        match response.json::<HealthResponse>().await {
            Ok(body) => body.healthy,
            Err(err) => {
                debug!(%url, error = %err, "health response was malformed");
                false
            }
        }
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthProbe for HttpHealthProbe {
    fn is_responsive<'a>(&'a self, endpoint: &'a DaemonEndpoint) -> ProbeFuture<'a> {
        Box::pin(self.probe(endpoint))
    }
}

/// Why a single health attempt did not succeed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HealthFailure {
    /// The backend reports its resource as not running.
    NotRunning,
    /// The resource runs but the daemon did not answer healthy.
    Unresponsive,
}

impl fmt::Display for HealthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRunning => f.write_str("resource is not running"),
            Self::Unresponsive => f.write_str("daemon is not responding"),
        }
    }
}

/// Result of one health attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HealthOutcome {
    /// Both checks passed.
    Ready,
    /// The attempt failed and may be retried.
    Retry(HealthFailure),
}

/// What the health loop does after a failed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum HealthStep {
    /// Sleep, then probe again.
    Wait(Duration),
    /// The wall-clock budget is spent.
    TimedOut,
    /// Every attempt has been used.
    Exhausted,
}

/// Decides the next step after failed attempt number `attempt` (1-based).
/// The budget is checked before the attempt count.
pub(crate) fn next_health_step(
    attempt: u32,
    max_attempts: u32,
    elapsed: Duration,
    budget: Duration,
    poll_interval: Duration,
) -> HealthStep {
    if elapsed >= budget {
        return HealthStep::TimedOut;
    }
    if attempt >= max_attempts {
        return HealthStep::Exhausted;
    }
    HealthStep::Wait(poll_interval.min(budget.saturating_sub(elapsed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::AuthToken;
    use crate::test_support::closed_local_port;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const POLL: Duration = Duration::from_secs(5);

    #[rstest]
    #[case(1, 10, 0, 60, HealthStep::Wait(Duration::from_secs(5)))]
    #[case(3, 10, 57, 60, HealthStep::Wait(Duration::from_secs(3)))]
    #[case(2, 10, 60, 60, HealthStep::TimedOut)]
    #[case(10, 10, 60, 60, HealthStep::TimedOut)]
    #[case(10, 10, 45, 60, HealthStep::Exhausted)]
    fn next_step_prefers_timeout_over_exhaustion(
        #[case] attempt: u32,
        #[case] max_attempts: u32,
        #[case] elapsed_secs: u64,
        #[case] budget_secs: u64,
        #[case] expected: HealthStep,
    ) {
        let step = next_health_step(
            attempt,
            max_attempts,
            Duration::from_secs(elapsed_secs),
            Duration::from_secs(budget_secs),
            POLL,
        );
        assert_eq!(step, expected);
    }

    fn endpoint_for(server: &MockServer) -> DaemonEndpoint {
        let address = server.address();
        DaemonEndpoint::new(
            format!("http://{}", address.ip()),
            address.port(),
            AuthToken::new("token"),
        )
    }

    async fn probe_with(template: ResponseTemplate) -> bool {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(template)
            .mount(&server)
            .await;
        HttpHealthProbe::new()
            .is_responsive(&endpoint_for(&server))
            .await
    }

    #[tokio::test]
    async fn healthy_document_is_responsive() {
        let ok = probe_with(ResponseTemplate::new(200).set_body_json(json!({"healthy": true}))).await;
        assert!(ok);
    }

    #[rstest]
    #[case(ResponseTemplate::new(200).set_body_json(json!({"healthy": false})))]
    #[case(ResponseTemplate::new(503).set_body_json(json!({"healthy": true})))]
    #[case(ResponseTemplate::new(200).set_body_string("not json"))]
    #[case(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))]
    #[tokio::test]
    async fn anything_but_a_healthy_document_is_unresponsive(#[case] template: ResponseTemplate) {
        assert!(!probe_with(template).await);
    }

    #[tokio::test]
    async fn refused_connection_is_unresponsive() {
        let port = closed_local_port().unwrap_or_else(|err| panic!("free port: {err}"));
        let endpoint = DaemonEndpoint::new("http://127.0.0.1", port, AuthToken::new("token"));

        assert!(!HttpHealthProbe::new().is_responsive(&endpoint).await);
    }
}
