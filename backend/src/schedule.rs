//! Collaborator seams.

use async_trait::async_trait;
use rollcall_types::ScopeId;

use crate::error::BackendError;
use crate::types::TokenResolution;

/// Token-rotation schedule control.
#[async_trait]
pub trait ScheduleBackend: Send + Sync {
    /// Start rotating tokens for every scope in one batched request.
    async fn start_schedule(&self, scopes: &[ScopeId]) -> Result<(), BackendError>;

    /// Stop rotation for `scopes`.
    ///
    /// Returns immediately. Implementations must keep delivering the signal
    /// after the caller has moved on (page teardown, process shutdown).
    fn signal_stop(&self, scopes: &[ScopeId]);
}

/// Looks up the verification config behind a scanned or issued token.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve_token(&self, token: &str) -> Result<TokenResolution, BackendError>;
}
