//! Nullable backend: records schedule calls and serves canned tokens.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rollcall_backend::{BackendError, ScheduleBackend, TokenResolution, TokenResolver};
use rollcall_types::ScopeId;

#[derive(Default)]
pub struct NullScheduleBackend {
    starts: Mutex<Vec<Vec<ScopeId>>>,
    stops: Mutex<Vec<Vec<ScopeId>>>,
    start_error: Option<BackendError>,
    start_delay: Duration,
    tokens: Mutex<HashMap<String, TokenResolution>>,
}

impl NullScheduleBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `start_schedule` fails with `error`.
    pub fn failing_start(error: BackendError) -> Self {
        Self {
            start_error: Some(error),
            ..Self::default()
        }
    }

    /// `start_schedule` takes `delay` to resolve.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_token(self, token: impl Into<String>, resolution: TokenResolution) -> Self {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.into(), resolution);
        self
    }

    /// Scope lists passed to each `start_schedule` call.
    pub fn starts(&self) -> Vec<Vec<ScopeId>> {
        self.starts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Scope lists passed to each `signal_stop` call.
    pub fn stops(&self) -> Vec<Vec<ScopeId>> {
        self.stops.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ScheduleBackend for NullScheduleBackend {
    async fn start_schedule(&self, scopes: &[ScopeId]) -> Result<(), BackendError> {
        self.starts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(scopes.to_vec());
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        match &self.start_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn signal_stop(&self, scopes: &[ScopeId]) {
        self.stops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(scopes.to_vec());
    }
}

#[async_trait]
impl TokenResolver for NullScheduleBackend {
    async fn resolve_token(&self, token: &str) -> Result<TokenResolution, BackendError> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()
            .ok_or_else(|| BackendError::TokenNotFound(token.to_string()))
    }
}
