//! Network location of a running daemon.

use super::AuthToken;

/// Base URL, port, and credentials needed to reach a daemon.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DaemonEndpoint {
    base_url: String,
    port: u16,
    token: AuthToken,
}

impl DaemonEndpoint {
    /// Builds an endpoint; a trailing `/` on `base_url` is dropped.
    #[must_use]
    pub fn new(base_url: impl Into<String>, port: u16, token: AuthToken) -> Self {
        let mut root: String = base_url.into();
        while root.ends_with('/') {
            root.pop();
        }
        Self {
            base_url: root,
            port,
            token,
        }
    }

    /// Scheme and host, for example `http://localhost`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// TCP port the daemon listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Bearer token accepted by the daemon.
    #[must_use]
    pub const fn token(&self) -> &AuthToken {
        &self.token
    }

    /// Root URL of the daemon, `{base_url}:{port}`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}:{}", self.base_url, self.port)
    }

    /// Absolute URL for a request path starting with `/`.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}:{}{path}", self.base_url, self.port)
    }
}
