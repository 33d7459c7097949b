//! One-shot geolocation sampling.

use std::time::Duration;

use async_trait::async_trait;
use rollcall_types::{GeoPoint, PresenceError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A single position fix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoFix {
    pub point: GeoPoint,
    /// Reported accuracy radius in meters, when the device provides one.
    pub accuracy_meters: Option<f64>,
}

/// A device position source. Each call is an independent one-shot query.
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<GeoFix, PresenceError>;
}

/// Take exactly one position sample, bounded by `timeout`.
///
/// Timeouts and invalid fixes surface as `GeolocationUnavailable`.
pub async fn sample_once(
    locator: &dyn Geolocator,
    timeout: Duration,
) -> Result<GeoFix, PresenceError> {
    let fix = match tokio::time::timeout(timeout, locator.current_position()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!(?timeout, "geolocation sample timed out");
            return Err(PresenceError::GeolocationUnavailable(format!(
                "no position within {}ms",
                timeout.as_millis()
            )));
        }
    };
    if !fix.point.is_valid() {
        return Err(PresenceError::GeolocationUnavailable(format!(
            "invalid fix {}",
            fix.point
        )));
    }
    debug!(accuracy = ?fix.accuracy_meters, "geolocation sampled");
    Ok(fix)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(GeoFix);

    #[async_trait]
    impl Geolocator for Fixed {
        async fn current_position(&self) -> Result<GeoFix, PresenceError> {
            Ok(self.0)
        }
    }

    struct Hanging;

    #[async_trait]
    impl Geolocator for Hanging {
        async fn current_position(&self) -> Result<GeoFix, PresenceError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn returns_fix() {
        let fix = GeoFix {
            point: GeoPoint::new(1.0, 2.0).unwrap(),
            accuracy_meters: Some(12.0),
        };
        assert_eq!(sample_once(&Fixed(fix), Duration::from_secs(1)).await, Ok(fix));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_geolocation_unavailable() {
        let result = sample_once(&Hanging, Duration::from_secs(10)).await;
        assert!(matches!(result, Err(PresenceError::GeolocationUnavailable(_))));
    }

    #[tokio::test]
    async fn out_of_range_fix_rejected() {
        let fix = GeoFix {
            point: GeoPoint {
                latitude: 120.0,
                longitude: 0.0,
            },
            accuracy_meters: None,
        };
        let result = sample_once(&Fixed(fix), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(PresenceError::GeolocationUnavailable(_))));
    }
}
