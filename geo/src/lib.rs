//! Location side of presence verification.
//!
//! - [`haversine_meters`]: great-circle distance on a 6,371 km sphere.
//! - [`Geolocator`] / [`sample_once`]: a single position fix with a timeout.
//! - [`Geofence`]: circular allowed region evaluation.
//! - [`GeofenceEditor`]: interactive capture of a center and radius.

pub mod distance;
pub mod editor;
pub mod fence;
pub mod locator;

pub use distance::{haversine_meters, EARTH_RADIUS_METERS};
pub use editor::{GeofenceEditor, DEFAULT_RADIUS_METERS, RADIUS_DEBOUNCE_MS};
pub use fence::{Geofence, GeofenceCheck};
pub use locator::{sample_once, GeoFix, Geolocator};
