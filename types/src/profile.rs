//! Enrollment profiles: the face reference and the allowed location.
//!
//! Profiles are durable state owned by the external persistence layer. This
//! module only constructs, validates and (de)serialises them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::embedding::Embedding;
use crate::error::ProfileError;
use crate::geo::GeoPoint;
use crate::image::EncodedImage;
use crate::pose::Pose;

/// Demographic hints estimated at the time of the straight-pose capture.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: f32,
    pub gender: String,
    pub dominant_emotion: String,
}

/// A face enrollment: one embedding per captured pose plus the reference
/// embedding used for matching.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceProfile {
    /// Identifier of the person this profile belongs to.
    pub owner: String,
    pub poses: BTreeMap<Pose, Embedding>,
    pub reference_embedding: Embedding,
    pub capture_image: Option<EncodedImage>,
    pub demographics: Demographics,
    /// When set, verification also requires the live dominant emotion to
    /// equal the enrolled one.
    pub require_emotion_match: bool,
}

impl FaceProfile {
    /// Build a profile whose reference is the straight-pose embedding.
    pub fn from_poses(
        owner: impl Into<String>,
        poses: BTreeMap<Pose, Embedding>,
    ) -> Result<Self, ProfileError> {
        let reference = poses
            .get(&Pose::Straight)
            .cloned()
            .ok_or(ProfileError::MissingStraightPose)?;
        let profile = Self {
            owner: owner.into(),
            poses,
            reference_embedding: reference,
            capture_image: None,
            demographics: Demographics::default(),
            require_emotion_match: false,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Replace the reference embedding. It must share the pose dimensionality.
    pub fn with_reference(mut self, reference: Embedding) -> Result<Self, ProfileError> {
        if reference.len() != self.dimension() {
            return Err(ProfileError::DimensionMismatch {
                pose: Pose::Straight,
                expected: self.dimension(),
                actual: reference.len(),
            });
        }
        self.reference_embedding = reference;
        Ok(self)
    }

    pub fn with_capture(mut self, image: EncodedImage) -> Self {
        self.capture_image = Some(image);
        self
    }

    pub fn with_demographics(mut self, demographics: Demographics) -> Self {
        self.demographics = demographics;
        self
    }

    pub fn with_emotion_match(mut self, required: bool) -> Self {
        self.require_emotion_match = required;
        self
    }

    pub fn straight(&self) -> Option<&Embedding> {
        self.poses.get(&Pose::Straight)
    }

    /// Dimensionality shared by every stored embedding.
    pub fn dimension(&self) -> usize {
        self.reference_embedding.len()
    }

    /// Every embedding is valid and of the same length, and the straight
    /// pose is present.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.straight().is_none() {
            return Err(ProfileError::MissingStraightPose);
        }
        self.reference_embedding.validate()?;
        let expected = self.reference_embedding.len();
        for (pose, embedding) in &self.poses {
            embedding.validate()?;
            if embedding.len() != expected {
                return Err(ProfileError::DimensionMismatch {
                    pose: *pose,
                    expected,
                    actual: embedding.len(),
                });
            }
        }
        Ok(())
    }

    /// Wire representation handed to the persistence layer.
    pub fn to_record(&self) -> FaceProfileRecord {
        FaceProfileRecord {
            poses: self.poses.clone(),
            capture: self.capture_image.as_ref().map(EncodedImage::to_data_url),
            age: self.demographics.age,
            gender: self.demographics.gender.clone(),
            emotion: self.demographics.dominant_emotion.clone(),
        }
    }

    /// Rebuild a profile from its wire representation.
    pub fn from_record(
        owner: impl Into<String>,
        record: FaceProfileRecord,
    ) -> Result<Self, ProfileError> {
        let capture = record
            .capture
            .as_deref()
            .map(EncodedImage::from_data_url)
            .transpose()?;
        let mut profile = Self::from_poses(owner, record.poses)?.with_demographics(Demographics {
            age: record.age,
            gender: record.gender,
            dominant_emotion: record.emotion,
        });
        profile.capture_image = capture;
        Ok(profile)
    }
}

/// `{ poses: {<pose>: number[]}, capture, age, gender, emotion }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceProfileRecord {
    pub poses: BTreeMap<Pose, Embedding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
    #[serde(default)]
    pub age: f32,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub emotion: String,
}

/// A circular allowed-location region.
///
/// Serialised as `{ latitude, longitude, radius }`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeofenceProfile {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "radius")]
    pub radius_meters: f64,
}

impl GeofenceProfile {
    /// Smallest accepted radius in meters.
    pub const MIN_RADIUS_METERS: f64 = 1.0;

    pub fn new(center: GeoPoint, radius_meters: f64) -> Result<Self, ProfileError> {
        let profile = Self {
            latitude: center.latitude,
            longitude: center.longitude,
            radius_meters,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if !self.center().is_valid() {
            return Err(ProfileError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            });
        }
        validate_radius(self.radius_meters)
    }
}

/// A radius is valid when it is finite and at least one meter.
pub fn validate_radius(radius_meters: f64) -> Result<(), ProfileError> {
    if radius_meters.is_finite() && radius_meters >= GeofenceProfile::MIN_RADIUS_METERS {
        Ok(())
    } else {
        Err(ProfileError::InvalidRadius(radius_meters))
    }
}
