//! Caller context
//!
//! Identity of the client on whose behalf streams are invoked. The context
//! is resolved once by the transport and passed explicitly to every
//! invocation; nothing reads identity from ambient state.

use std::collections::HashSet;
use std::sync::Arc;

/// Prefix that turns a role name into its authority string
pub const ROLE_PREFIX: &str = "ROLE_";

/// Authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    /// User name
    pub name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Snapshot of the caller's identity and granted authorities
///
/// Cheap to clone; the authority set is shared. A clone taken at subscribe
/// time is what the invoked stream sees for its whole lifetime.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    principal: Option<Principal>,
    authorities: Arc<HashSet<String>>,
}

impl CallerContext {
    /// Context for an unauthenticated caller
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for an authenticated caller with the given authorities
    pub fn authenticated<I, S>(principal: Principal, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            principal: Some(principal),
            authorities: Arc::new(authorities.into_iter().map(Into::into).collect()),
        }
    }

    /// The authenticated principal, if any
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Whether the caller is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    /// Check for a raw authority string
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// Check role membership (`admin` matches the `ROLE_admin` authority)
    pub fn is_in_role(&self, role: &str) -> bool {
        self.authorities
            .iter()
            .any(|a| a.strip_prefix(ROLE_PREFIX) == Some(role))
    }

    /// Iterate over granted authorities
    pub fn authorities(&self) -> impl Iterator<Item = &str> {
        self.authorities.iter().map(String::as_str)
    }
}
