//! Bearer token shared between the provisioner and the daemon.

use std::fmt;
use std::iter;

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated tokens. 43 alphanumeric characters carry slightly more
/// than 256 bits of entropy.
pub const GENERATED_TOKEN_LEN: usize = 43;

/// Secret presented as `Authorization: Bearer <token>` on every daemon call.
///
/// `Debug` output is redacted so tokens never reach logs.
#[derive(Clone, Eq, PartialEq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps an existing token.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Draws a fresh random token from the thread-local generator.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let value = iter::repeat_with(|| rng.sample(Alphanumeric))
            .map(char::from)
            .take(GENERATED_TOKEN_LEN)
            .collect::<String>();
        Self(value)
    }

    /// Returns the secret for use in request headers.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}
