//! Caller identity passed explicitly into every registry operation.

use std::fmt;
use std::sync::Arc;

use crate::error::ClientError;

/// Name of an authenticated caller, e.g. a username or a service account.
///
/// Only constructed through [`PrincipalContext::identity`], so it is never empty.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalIdentity(Arc<str>);

impl PrincipalIdentity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrincipalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PrincipalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Security principal of the current request or operation.
///
/// A context may be anonymous (no identity at all) or carry an identity name.
/// Registry operations refuse anonymous contexts and contexts whose identity
/// name is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalContext {
    identity: Option<String>,
}

impl PrincipalContext {
    /// Create a context for the named identity.
    #[must_use]
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
        }
    }

    /// Create an anonymous context without identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Raw identity name, if any.
    #[must_use]
    pub fn identity_name(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Resolve the identity used to scope registry entries.
    ///
    /// # Errors
    /// Returns [`ClientError::PrincipalMissing`] if the context has no identity
    /// or the identity name is empty.
    pub fn identity(&self) -> Result<PrincipalIdentity, ClientError> {
        let Some(name) = self.identity.as_deref() else {
            return Err(ClientError::PrincipalMissing(
                "principal found, but the identity is not set",
            ));
        };
        if name.trim().is_empty() {
            return Err(ClientError::PrincipalMissing(
                "principal found, but the identity name is invalid",
            ));
        }
        Ok(PrincipalIdentity(Arc::from(name)))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn named_context_resolves() {
        let ctx = PrincipalContext::new("testUser");
        let identity = ctx.identity().unwrap();
        assert_eq!(identity.as_str(), "testUser");
        assert_eq!(ctx.identity_name(), Some("testUser"));
    }

    #[test]
    fn anonymous_context_is_rejected() {
        let err = PrincipalContext::anonymous().identity().unwrap_err();
        assert!(matches!(err, ClientError::PrincipalMissing(_)));
    }

    #[test]
    fn blank_identity_is_rejected() {
        for name in ["", "   "] {
            let err = PrincipalContext::new(name).identity().unwrap_err();
            assert!(
                matches!(err, ClientError::PrincipalMissing(msg) if msg.contains("invalid")),
                "identity {name:?} should be rejected"
            );
        }
    }
}
