//! Token rendering seam and the first-token reveal.

use std::time::Duration;

use rollcall_types::{PresenceToken, ScopeId};
use tracing::{debug, info};

/// Draws the visual token artifact (QR code, text, ...).
pub trait TokenRenderer: Send + Sync {
    fn render(&self, token: &PresenceToken);

    /// Reveal mask radius as a fraction of full size, in `[0, 1]`.
    fn reveal_progress(&self, _scope: &ScopeId, _fraction: f64) {}

    fn clear(&self, _scope: &ScopeId) {}
}

/// Renderer that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRenderer;

impl TokenRenderer for LogRenderer {
    fn render(&self, token: &PresenceToken) {
        info!(scope = %token.scope_id, issued_at = %token.issued_at.to_datetime_string(), "token rotated");
        debug!(scope = %token.scope_id, token = %token.token_value, "token value");
    }

    fn reveal_progress(&self, scope: &ScopeId, fraction: f64) {
        debug!(scope = %scope, fraction, "reveal");
    }

    fn clear(&self, scope: &ScopeId) {
        debug!(scope = %scope, "token cleared");
    }
}

/// A masked radius growing from 0 to full over `duration`, drawn in `steps`
/// frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealAnimation {
    pub duration: Duration,
    pub steps: u32,
}

impl Default for RevealAnimation {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(800),
            steps: 16,
        }
    }
}

impl RevealAnimation {
    pub fn new(duration: Duration, steps: u32) -> Self {
        Self {
            duration,
            steps: steps.max(1),
        }
    }

    /// Radius fraction after `elapsed`.
    pub fn fraction_at(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Draw every frame from 0 to 1 inclusive, spaced evenly over the duration.
    pub async fn play(&self, scope: &ScopeId, renderer: &dyn TokenRenderer) {
        let steps = self.steps.max(1);
        let frame = self.duration / steps;
        renderer.reveal_progress(scope, 0.0);
        for step in 1..=steps {
            tokio::time::sleep(frame).await;
            let fraction = if step == steps {
                1.0
            } else {
                self.fraction_at(frame * step)
            };
            renderer.reveal_progress(scope, fraction);
        }
    }
}
