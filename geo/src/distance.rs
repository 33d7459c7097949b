//! Great-circle distance.

use rollcall_types::GeoPoint;

/// Mean Earth radius used for every distance computation.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h marginally past 1 for antipodal points.
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();
    EARTH_RADIUS_METERS * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_meters(p(0.0, 0.0), p(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 1.0, "{d}");
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = haversine_meters(p(0.0, 0.0), p(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1e-3);
    }

    #[test]
    fn short_urban_distance() {
        // Two points roughly 150 m apart along a meridian.
        let d = haversine_meters(p(-6.2000, 106.8166), p(-6.201349, 106.8166));
        assert!((d - 150.0).abs() < 0.5, "{d}");
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(lat in -90.0f64..=90.0, lng in -180.0f64..=180.0) {
            prop_assert_eq!(haversine_meters(p(lat, lng), p(lat, lng)), 0.0);
        }

        #[test]
        fn distance_is_symmetric(
            lat1 in -90.0f64..=90.0, lng1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lng2 in -180.0f64..=180.0,
        ) {
            let ab = haversine_meters(p(lat1, lng1), p(lat2, lng2));
            let ba = haversine_meters(p(lat2, lng2), p(lat1, lng1));
            prop_assert!((ab - ba).abs() < 1e-6);
        }
    }
}
