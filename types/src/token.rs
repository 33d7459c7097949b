//! Rotating presence tokens.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::Timestamp;

/// Identifier of a presence scope (for example one attendance schedule).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ScopeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A short-lived token representing current presence-scan eligibility.
///
/// Superseded by the next token for the same scope or by an explicit stop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceToken {
    pub scope_id: ScopeId,
    pub token_value: String,
    pub issued_at: Timestamp,
}

impl PresenceToken {
    pub fn new(scope_id: ScopeId, token_value: impl Into<String>, issued_at: Timestamp) -> Self {
        Self {
            scope_id,
            token_value: token_value.into(),
            issued_at,
        }
    }

    /// Whether `other` replaces this token (same scope, different value).
    pub fn is_superseded_by(&self, other: &PresenceToken) -> bool {
        self.scope_id == other.scope_id && self.token_value != other.token_value
    }
}
