//! HTTP client for the backend collaborator.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rollcall_types::ScopeId;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::BackendError;
use crate::schedule::{ScheduleBackend, TokenResolver};
use crate::types::TokenResolution;

/// Default timeout for backend requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry schedule for stop signals: exponential backoff with a cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Serialize)]
struct ScopesBody<'a> {
    scopes: &'a [ScopeId],
}

/// Backend client over HTTP/JSON.
///
/// Stop signals are delivered by detached tasks; call
/// [`HttpBackend::drain_pending`] before process exit so they are not lost.
pub struct HttpBackend {
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    pending: Mutex<JoinSet<()>>,
}

impl HttpBackend {
    /// Create a client with default timeout settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Number of stop deliveries still in flight.
    pub fn pending_deliveries(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait for in-flight stop deliveries, up to `timeout`.
    ///
    /// Returns `true` if every delivery task finished (successfully or after
    /// exhausting its retries).
    pub async fn drain_pending(&self, timeout: Duration) -> bool {
        let mut set = std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()));
        let drained = tokio::time::timeout(timeout, async {
            while set.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !drained {
            warn!(remaining = set.len(), "stop deliveries still pending at shutdown");
        }
        drained
    }
}

#[async_trait]
impl ScheduleBackend for HttpBackend {
    async fn start_schedule(&self, scopes: &[ScopeId]) -> Result<(), BackendError> {
        let url = self.url("schedule/start");
        post_scopes(&self.http_client, &url, scopes).await?;
        info!(count = scopes.len(), "token schedule started");
        Ok(())
    }

    fn signal_stop(&self, scopes: &[ScopeId]) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("no async runtime available to deliver stop signal");
            return;
        };
        let client = self.http_client.clone();
        let url = self.url("schedule/stop");
        let scopes = scopes.to_vec();
        let retry = self.retry;
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .spawn_on(deliver_stop(client, url, scopes, retry), &runtime);
    }
}

#[async_trait]
impl TokenResolver for HttpBackend {
    async fn resolve_token(&self, token: &str) -> Result<TokenResolution, BackendError> {
        if !is_url_safe_token(token) {
            return Err(BackendError::TokenNotFound(token.to_string()));
        }
        let url = self.url(&format!("tokens/{token}"));
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(map_send_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::TokenNotFound(token.to_string()));
        }
        if !response.status().is_success() {
            return Err(BackendError::RequestFailed(format!(
                "HTTP status {}",
                response.status()
            )));
        }
        let resolution: TokenResolution = response.json().await.map_err(|e| {
            BackendError::InvalidResponse(format!("failed to parse token resolution: {e}"))
        })?;
        debug!(scope = %resolution.scope_id, "token resolved");
        Ok(resolution)
    }
}

/// Tokens are opaque but must be safe to embed in a URL path segment.
fn is_url_safe_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn map_send_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        BackendError::Unreachable(format!("connection failed: {e}"))
    } else {
        BackendError::RequestFailed(e.to_string())
    }
}

/// POST a scope list.
///
/// Standalone so detached delivery tasks do not borrow the client.
async fn post_scopes(
    client: &reqwest::Client,
    url: &str,
    scopes: &[ScopeId],
) -> Result<(), BackendError> {
    let response = client
        .post(url)
        .json(&ScopesBody { scopes })
        .send()
        .await
        .map_err(map_send_error)?;

    if !response.status().is_success() {
        return Err(BackendError::RequestFailed(format!(
            "HTTP status {}",
            response.status()
        )));
    }
    Ok(())
}

async fn deliver_stop(
    client: reqwest::Client,
    url: String,
    scopes: Vec<ScopeId>,
    retry: RetryPolicy,
) {
    let attempts = retry.max_attempts.max(1);
    for attempt in 1..=attempts {
        match post_scopes(&client, &url, &scopes).await {
            Ok(()) => {
                info!(count = scopes.len(), attempt, "token schedule stopped");
                return;
            }
            Err(e) => {
                warn!(attempt, error = %e, "stop signal delivery failed");
                if attempt < attempts {
                    tokio::time::sleep(retry.backoff(attempt)).await;
                }
            }
        }
    }
    error!(count = scopes.len(), "giving up on stop signal after {attempts} attempts");
}
