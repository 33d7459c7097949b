//! Verification inputs.

use std::time::Duration;

use rollcall_backend::{ScopePolicy, TokenResolution};
use rollcall_types::{Embedding, FaceProfile, GeoPoint, GeofenceProfile, ProfileError};
use rollcall_vision::CameraConstraints;
use serde::{Deserialize, Serialize};

use crate::error::VerificationError;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_REQUIRED_SUCCESSES: u32 = 3;

/// Face step parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceConfig {
    pub reference_embedding: Embedding,
    pub similarity_threshold: f64,
    pub strict_mode: bool,
    pub max_attempts: u32,
    pub required_successes: u32,
    /// When set, a sample only matches if its dominant emotion equals this.
    #[serde(default)]
    pub required_emotion: Option<String>,
}

impl FaceConfig {
    pub fn new(reference_embedding: Embedding) -> Self {
        Self {
            reference_embedding,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            strict_mode: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            required_successes: DEFAULT_REQUIRED_SUCCESSES,
            required_emotion: None,
        }
    }

    /// Compare against the profile's straight-pose embedding.
    pub fn from_profile(profile: &FaceProfile) -> Result<Self, ProfileError> {
        let reference = profile
            .straight()
            .cloned()
            .ok_or(ProfileError::MissingStraightPose)?;
        let mut config = Self::new(reference);
        if profile.require_emotion_match {
            config.required_emotion = Some(profile.demographics.dominant_emotion.clone());
        }
        Ok(config)
    }

    pub fn with_policy(mut self, policy: &ScopePolicy) -> Self {
        self.strict_mode = policy.face_strict;
        self.similarity_threshold = policy.similarity_threshold;
        self.max_attempts = policy.max_attempts;
        self.required_successes = policy.required_successes;
        self
    }

    pub fn validate(&self) -> Result<(), VerificationError> {
        self.reference_embedding.validate()?;
        if !self.similarity_threshold.is_finite()
            || !(-1.0..=1.0).contains(&self.similarity_threshold)
        {
            return Err(VerificationError::invalid_config(format!(
                "similarity threshold {} outside [-1, 1]",
                self.similarity_threshold
            )));
        }
        if self.max_attempts == 0 {
            return Err(VerificationError::invalid_config("max_attempts must be at least 1"));
        }
        if self.required_successes == 0 || self.required_successes > self.max_attempts {
            return Err(VerificationError::invalid_config(format!(
                "required_successes {} must be within 1..={}",
                self.required_successes, self.max_attempts
            )));
        }
        if matches!(&self.required_emotion, Some(e) if e.trim().is_empty()) {
            return Err(VerificationError::invalid_config(
                "emotion match required but no enrolled emotion",
            ));
        }
        Ok(())
    }
}

/// Location step parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoConfig {
    pub target: GeoPoint,
    pub radius_meters: f64,
    pub strict_mode: bool,
}

impl GeoConfig {
    pub fn new(target: GeoPoint, radius_meters: f64) -> Self {
        Self {
            target,
            radius_meters,
            strict_mode: true,
        }
    }

    pub fn from_profile(profile: &GeofenceProfile, strict_mode: bool) -> Self {
        Self {
            target: profile.center(),
            radius_meters: profile.radius_meters,
            strict_mode,
        }
    }

    pub fn fence(&self) -> GeofenceProfile {
        GeofenceProfile {
            latitude: self.target.latitude,
            longitude: self.target.longitude,
            radius_meters: self.radius_meters,
        }
    }

    pub fn validate(&self) -> Result<(), VerificationError> {
        self.fence().validate()?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub face: Option<FaceConfig>,
    pub geo: Option<GeoConfig>,
}

impl VerificationConfig {
    pub fn face_only(face: FaceConfig) -> Self {
        Self {
            face: Some(face),
            geo: None,
        }
    }

    pub fn geo_only(geo: GeoConfig) -> Self {
        Self {
            face: None,
            geo: Some(geo),
        }
    }

    /// Build from what a scanned token resolves to.
    pub fn from_resolution(resolution: &TokenResolution) -> Result<Self, VerificationError> {
        let face = match &resolution.face {
            Some(record) => {
                let profile = FaceProfile::from_record(resolution.owner.clone(), record.clone())?
                    .with_emotion_match(resolution.require_emotion_match);
                Some(FaceConfig::from_profile(&profile)?.with_policy(&resolution.policy))
            }
            None => None,
        };
        let geo = resolution
            .geofence
            .as_ref()
            .map(|fence| GeoConfig::from_profile(fence, resolution.policy.geo_strict));
        let config = Self { face, geo };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VerificationError> {
        if self.face.is_none() && self.geo.is_none() {
            return Err(VerificationError::invalid_config("nothing to verify"));
        }
        if let Some(face) = &self.face {
            face.validate()?;
        }
        if let Some(geo) = &self.geo {
            geo.validate()?;
        }
        Ok(())
    }
}

/// Loop timing for the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineOptions {
    pub frame_interval: Duration,
    /// Give up when no acceptable face is seen for this long.
    pub idle_timeout: Duration,
    pub session_budget: Duration,
    pub geolocation_timeout: Duration,
    pub constraints: CameraConstraints,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(200),
            idle_timeout: Duration::from_millis(3000),
            session_budget: Duration::from_secs(60),
            geolocation_timeout: Duration::from_secs(10),
            constraints: CameraConstraints::default(),
        }
    }
}
