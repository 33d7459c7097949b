//! Interactive geofence enrollment.
//!
//! A map point selection commits immediately. Radius edits are debounced:
//! only the last edit in a rapid series is committed, once [`RADIUS_DEBOUNCE_MS`]
//! has passed without another edit. Every commit is pushed synchronously to
//! the caller's sink. No network calls happen here.

use std::sync::Arc;

use rollcall_types::{validate_radius, Clock, GeoPoint, GeofenceProfile, ProfileError, Timestamp};
use tracing::debug;

/// Quiet period before a radius edit is committed.
pub const RADIUS_DEBOUNCE_MS: u64 = 200;

/// Radius used until the user edits it.
pub const DEFAULT_RADIUS_METERS: f64 = 100.0;

pub struct GeofenceEditor<S>
where
    S: FnMut(&GeofenceProfile),
{
    clock: Arc<dyn Clock>,
    sink: S,
    center: Option<GeoPoint>,
    radius_meters: f64,
    pending_radius: Option<(f64, Timestamp)>,
}

impl<S> GeofenceEditor<S>
where
    S: FnMut(&GeofenceProfile),
{
    pub fn new(clock: Arc<dyn Clock>, sink: S) -> Self {
        Self {
            clock,
            sink,
            center: None,
            radius_meters: DEFAULT_RADIUS_METERS,
            pending_radius: None,
        }
    }

    /// Start from a previously stored profile without emitting.
    pub fn with_profile(mut self, profile: GeofenceProfile) -> Result<Self, ProfileError> {
        profile.validate()?;
        self.center = Some(profile.center());
        self.radius_meters = profile.radius_meters;
        Ok(self)
    }

    /// Map interaction: move the center and emit.
    pub fn select_point(&mut self, point: GeoPoint) -> Result<(), ProfileError> {
        if !point.is_valid() {
            return Err(ProfileError::InvalidCoordinate {
                latitude: point.latitude,
                longitude: point.longitude,
            });
        }
        self.center = Some(point);
        debug!(%point, "geofence center selected");
        self.emit();
        Ok(())
    }

    /// Radius input: schedule a commit after the debounce interval.
    ///
    /// Radii below one meter are rejected and leave both the committed and
    /// the pending radius untouched.
    pub fn edit_radius(&mut self, radius_meters: f64) -> Result<(), ProfileError> {
        validate_radius(radius_meters)?;
        self.pending_radius = Some((radius_meters, self.clock.now()));
        Ok(())
    }

    /// Commit a pending radius edit whose debounce interval has elapsed.
    ///
    /// Returns the emitted profile, if any.
    pub fn tick(&mut self) -> Option<GeofenceProfile> {
        let (radius, edited_at) = self.pending_radius?;
        if !edited_at.has_expired(RADIUS_DEBOUNCE_MS, self.clock.now()) {
            return None;
        }
        self.pending_radius = None;
        self.radius_meters = radius;
        debug!(radius, "geofence radius committed");
        self.emit()
    }

    /// The committed geofence, once a center has been selected.
    pub fn current(&self) -> Option<GeofenceProfile> {
        self.center.map(|center| GeofenceProfile {
            latitude: center.latitude,
            longitude: center.longitude,
            radius_meters: self.radius_meters,
        })
    }

    pub fn has_pending_edit(&self) -> bool {
        self.pending_radius.is_some()
    }

    fn emit(&mut self) -> Option<GeofenceProfile> {
        let profile = self.current()?;
        (self.sink)(&profile);
        Some(profile)
    }
}
