//! Verification attempts and the result record handed to the form layer.

use rollcall_geo::GeofenceCheck;
use rollcall_types::{Embedding, EncodedImage, GeoPoint, Timestamp};
use rollcall_utils::format_percent;
use serde::{Deserialize, Serialize};

/// One live face sample.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceSample {
    /// 1-based attempt number.
    pub attempt: u32,
    pub similarity: f64,
    pub is_match: bool,
}

/// The terminal result of a verification session.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationAttempt {
    /// Embedding of the evidence sample. Never serialized.
    pub captured_embedding: Option<Embedding>,
    /// Last matching similarity, or the best one seen if nothing matched.
    pub similarity: Option<f64>,
    pub is_match: bool,
    pub successes: u32,
    pub attempts: u32,
    pub location: Option<GeoPoint>,
    pub radius_meters: Option<f64>,
    pub geo: Option<GeofenceCheck>,
    pub overall_match: bool,
    pub evidence_image: Option<EncodedImage>,
    pub timestamp: Timestamp,
}

impl VerificationAttempt {
    pub fn within_radius(&self) -> bool {
        self.geo.map(|g| g.within_radius).unwrap_or(false)
    }

    pub fn geo_distance(&self) -> Option<f64> {
        self.geo.map(|g| g.distance_meters)
    }

    pub fn to_record(&self) -> AttemptRecord {
        AttemptRecord {
            face_file: self.evidence_image.as_ref().map(EncodedImage::to_data_url),
            accuracy: self.similarity.map(format_percent).unwrap_or_default(),
            location: self.location.map(|p| p.to_string()).unwrap_or_default(),
            radius: self.radius_meters.unwrap_or(0.0),
            distance: self.geo_distance().unwrap_or(0.0),
            in_radius: u8::from(self.within_radius()),
            timestamp: self.timestamp.to_datetime_string(),
            is_verified: u8::from(self.overall_match),
        }
    }
}

/// `{ face_file, accuracy, location, radius, distance, in_radius, timestamp, is_verified }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Evidence frame as a data URL.
    pub face_file: Option<String>,
    /// `"NN.NN%"`, empty without a face step.
    ///
    /// The last matching similarity. When no frame matched (only possible
    /// with lenient face matching) it is the best non-matching similarity,
    /// which is not by itself evidence of a match.
    pub accuracy: String,
    /// `"lat,lng"`, empty without a position.
    pub location: String,
    pub radius: f64,
    pub distance: f64,
    pub in_radius: u8,
    /// UTC `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    pub is_verified: u8,
}
