//! Credential used to authenticate against the policy decision service.

use std::fmt;

/// Bearer credential for the decision service. Resolved once at startup and
/// immutable for the rest of the process lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct PolicyIdentity(String);

impl PolicyIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PolicyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PolicyIdentity(<redacted>)")
    }
}
