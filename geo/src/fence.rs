//! Circular allowed-location regions.

use rollcall_types::{GeoPoint, GeofenceProfile, ProfileError};
use serde::{Deserialize, Serialize};

use crate::distance::haversine_meters;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geofence {
    pub center: GeoPoint,
    pub radius_meters: f64,
}

/// Result of testing a position against a geofence.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeofenceCheck {
    pub distance_meters: f64,
    pub within_radius: bool,
}

impl Geofence {
    pub fn new(center: GeoPoint, radius_meters: f64) -> Result<Self, ProfileError> {
        let profile = GeofenceProfile::new(center, radius_meters)?;
        Ok(Self::from(profile))
    }

    /// `within_radius` is inclusive of the boundary.
    pub fn check(&self, position: GeoPoint) -> GeofenceCheck {
        let distance_meters = haversine_meters(position, self.center);
        GeofenceCheck {
            distance_meters,
            within_radius: distance_meters <= self.radius_meters,
        }
    }
}

impl From<GeofenceProfile> for Geofence {
    fn from(profile: GeofenceProfile) -> Self {
        Self {
            center: profile.center(),
            radius_meters: profile.radius_meters,
        }
    }
}
