//! Nullable geolocator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rollcall_geo::{GeoFix, Geolocator};
use rollcall_types::{GeoPoint, PresenceError};

/// Returns a fixed fix (or error), optionally after a delay.
pub struct NullGeolocator {
    outcome: Result<GeoFix, PresenceError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl NullGeolocator {
    pub fn at(point: GeoPoint) -> Self {
        Self {
            outcome: Ok(GeoFix {
                point,
                accuracy_meters: Some(5.0),
            }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: PresenceError) -> Self {
        Self {
            outcome: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Respond only after `delay` (tokio time).
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geolocator for NullGeolocator {
    async fn current_position(&self) -> Result<GeoFix, PresenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}
