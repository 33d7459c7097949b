//! Nullable token renderer.

use std::sync::Mutex;

use rollcall_broadcast::TokenRenderer;
use rollcall_types::{PresenceToken, ScopeId};

/// Records everything it is asked to draw.
#[derive(Default)]
pub struct NullRenderer {
    rendered: Mutex<Vec<PresenceToken>>,
    reveal_frames: Mutex<Vec<(ScopeId, f64)>>,
    cleared: Mutex<Vec<ScopeId>>,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> Vec<PresenceToken> {
        self.rendered.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Reveal fractions drawn for `scope`, in order.
    pub fn reveal_frames(&self, scope: &ScopeId) -> Vec<f64> {
        self.reveal_frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(s, _)| s == scope)
            .map(|(_, fraction)| *fraction)
            .collect()
    }

    pub fn cleared(&self) -> Vec<ScopeId> {
        self.cleared.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TokenRenderer for NullRenderer {
    fn render(&self, token: &PresenceToken) {
        self.rendered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(token.clone());
    }

    fn reveal_progress(&self, scope: &ScopeId, fraction: f64) {
        self.reveal_frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((scope.clone(), fraction));
    }

    fn clear(&self, scope: &ScopeId) {
        self.cleared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(scope.clone());
    }
}
