use proptest::prelude::*;

use rollcall_types::{EncodedImage, GeoPoint, GeofenceProfile, Timestamp};

proptest! {
    /// Timestamp ordering: from_millis(a) <= from_millis(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::from_millis(a);
        let tb = Timestamp::from_millis(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Any in-range coordinate survives the `lat,lng` text form.
    #[test]
    fn geo_point_text_roundtrip(lat in -90.0f64..=90.0, lng in -180.0f64..=180.0) {
        let p = GeoPoint::new(lat, lng).unwrap();
        let parsed: GeoPoint = p.to_string().parse().unwrap();
        prop_assert_eq!(parsed, p);
    }

    /// Radii below one meter are never accepted.
    #[test]
    fn sub_meter_radius_rejected(radius in -1000.0f64..1.0) {
        let center = GeoPoint::new(0.0, 0.0).unwrap();
        prop_assert!(GeofenceProfile::new(center, radius).is_err());
    }

    /// Arbitrary image bytes survive the data URL form.
    #[test]
    fn data_url_roundtrip(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let img = EncodedImage::jpeg(bytes);
        let back = EncodedImage::from_data_url(&img.to_data_url()).unwrap();
        prop_assert_eq!(back, img);
    }
}
