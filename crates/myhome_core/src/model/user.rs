//! Caller identity resolved per request.
//!
//! # Invariants
//! - Identities are transient; nothing in this crate persists them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Authority name fragment that marks employee accounts.
///
/// Matched as a substring, so `ROLE_EMPLOYEE_MANAGER` also qualifies.
pub const EMPLOYEE_AUTHORITY_MARKER: &str = "ROLE_EMPLOYEE";

/// Named permission held by a caller, e.g. `ROLE_ADMIN`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Authority(String);

impl Authority {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Authenticated caller and the authorities granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub login: String,
    pub authorities: BTreeSet<Authority>,
}

impl UserIdentity {
    pub fn new<I, S>(login: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            login: login.into(),
            authorities: authorities.into_iter().map(Authority::new).collect(),
        }
    }

    /// Returns whether any authority name contains `fragment`.
    pub fn has_authority_containing(&self, fragment: &str) -> bool {
        self.authorities
            .iter()
            .any(|authority| authority.name().contains(fragment))
    }

    pub fn is_employee(&self) -> bool {
        self.has_authority_containing(EMPLOYEE_AUTHORITY_MARKER)
    }
}
