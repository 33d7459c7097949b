//! The verification session driver.

use std::sync::{Arc, Mutex};

use rollcall_backend::TokenResolver;
use rollcall_geo::{sample_once, Geofence, GeofenceCheck, Geolocator};
use rollcall_types::{Clock, EncodedImage, Embedding, GeoPoint, PresenceError, SystemClock};
use rollcall_vision::{
    select_face, CameraArbiter, CameraSession, DetectedFace, FaceDetector, SessionControl,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::attempt::{FaceSample, VerificationAttempt};
use crate::config::{EngineOptions, FaceConfig, GeoConfig, VerificationConfig};
use crate::consensus::{ConsensusState, ConsensusTally};
use crate::decision::{overall_match, FaceOutcome, GeoOutcome};
use crate::error::{Rejection, VerificationError};
use crate::similarity::{cosine_similarity, is_match};

const CAMERA_OWNER: &str = "verification";

/// Progress hooks for a host UI.
pub trait VerificationObserver: Send + Sync {
    fn on_location(&self, _position: Option<GeoPoint>, _check: Option<&GeofenceCheck>) {}

    fn on_sample(&self, _sample: &FaceSample) {}
}

pub struct NoopVerificationObserver;

impl VerificationObserver for NoopVerificationObserver {}

struct LocationStep {
    position: Option<GeoPoint>,
    check: Option<GeofenceCheck>,
}

struct FaceStep {
    tally: ConsensusTally,
    evidence: Option<Evidence>,
    last_reason: Option<PresenceError>,
}

struct Evidence {
    similarity: f64,
    image: EncodedImage,
    embedding: Embedding,
}

/// Runs verification sessions. Sessions on one engine are sequential; a
/// new `verify` call replaces the cancellation handle of the previous one.
pub struct VerificationEngine {
    arbiter: Arc<CameraArbiter>,
    detector: Arc<dyn FaceDetector>,
    geolocator: Option<Arc<dyn Geolocator>>,
    clock: Arc<dyn Clock>,
    options: EngineOptions,
    observer: Arc<dyn VerificationObserver>,
    control: Mutex<SessionControl>,
}

impl VerificationEngine {
    pub fn new(arbiter: Arc<CameraArbiter>, detector: Arc<dyn FaceDetector>) -> Self {
        Self {
            arbiter,
            detector,
            geolocator: None,
            clock: Arc::new(SystemClock),
            options: EngineOptions::default(),
            observer: Arc::new(NoopVerificationObserver),
            control: Mutex::new(SessionControl::new()),
        }
    }

    pub fn with_geolocator(mut self, geolocator: Arc<dyn Geolocator>) -> Self {
        self.geolocator = Some(geolocator);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn VerificationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Handle for the session currently running (or the next one).
    pub fn control(&self) -> SessionControl {
        self.control.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Stop the current session and release its camera.
    pub fn cancel(&self) {
        self.control().stop();
    }

    /// Resolve `token` and verify against what it refers to.
    pub async fn verify_token(
        &self,
        resolver: &dyn TokenResolver,
        token: &str,
    ) -> Result<VerificationAttempt, VerificationError> {
        let resolution = resolver.resolve_token(token).await?;
        debug!(scope = %resolution.scope_id, "verifying resolved token");
        let config = VerificationConfig::from_resolution(&resolution)?;
        self.verify(&config).await
    }

    /// Run one session to a terminal outcome.
    ///
    /// `Ok` means the attempt was accepted. Negative decisions come back as
    /// [`VerificationError::Rejected`] carrying the attempt; fatal setup and
    /// device errors are returned as they occur.
    pub async fn verify(
        &self,
        config: &VerificationConfig,
    ) -> Result<VerificationAttempt, VerificationError> {
        config.validate()?;
        let control = self.fresh_control();

        let location = match &config.geo {
            Some(geo) => Some(self.locate(geo).await?),
            None => None,
        };
        let geo_outcome = config.geo.as_ref().zip(location.as_ref()).map(|(geo, step)| GeoOutcome {
            strict: geo.strict_mode,
            within_radius: step.check.map(|c| c.within_radius).unwrap_or(false),
        });

        if let (Some(geo), Some(outcome)) = (&config.geo, &geo_outcome) {
            if outcome.strict && !outcome.within_radius {
                let distance = location
                    .as_ref()
                    .and_then(|l| l.check)
                    .map(|c| c.distance_meters)
                    .unwrap_or(f64::INFINITY);
                info!(distance, radius = geo.radius_meters, "outside strict geofence");
                let attempt = self.build_attempt(config, location.as_ref(), None, false);
                return Err(VerificationError::Rejected {
                    rejection: Rejection::GeoRejected {
                        distance_meters: distance,
                        radius_meters: geo.radius_meters,
                    },
                    attempt: Box::new(attempt),
                });
            }
        }

        let face_step = match &config.face {
            Some(face) => Some(self.match_face(face, &control).await?),
            None => None,
        };
        let face_outcome = config
            .face
            .as_ref()
            .zip(face_step.as_ref())
            .map(|(face, step)| FaceOutcome {
                strict: face.strict_mode,
                successes: step.tally.successes(),
                required: face.required_successes,
            });

        let accepted = overall_match(face_outcome.as_ref(), geo_outcome.as_ref());
        let attempt = self.build_attempt(config, location.as_ref(), face_step.as_ref(), accepted);

        if accepted {
            info!(
                successes = attempt.successes,
                attempts = attempt.attempts,
                "verification accepted"
            );
            return Ok(attempt);
        }

        let (step, required) = match (&face_step, &config.face) {
            (Some(step), Some(face)) => (step, face.required_successes),
            // Only a strict face step can fail once the geofence gate passed.
            _ => {
                return Err(VerificationError::invalid_config(
                    "negative decision without a face step",
                ))
            }
        };
        let rejection = Rejection::NoMatch {
            successes: step.tally.successes(),
            required,
            attempts: step.tally.attempts(),
            last_reason: step.last_reason.clone(),
        };
        info!(%rejection, "verification rejected");
        Err(VerificationError::Rejected {
            rejection,
            attempt: Box::new(attempt),
        })
    }

    fn fresh_control(&self) -> SessionControl {
        let control = SessionControl::new();
        let previous = std::mem::replace(
            &mut *self.control.lock().unwrap_or_else(|e| e.into_inner()),
            control.clone(),
        );
        previous.stop();
        control
    }

    async fn locate(&self, geo: &GeoConfig) -> Result<LocationStep, VerificationError> {
        let locator = self
            .geolocator
            .as_ref()
            .ok_or_else(|| VerificationError::invalid_config("geofence configured without a geolocator"))?;

        let step = match sample_once(locator.as_ref(), self.options.geolocation_timeout).await {
            Ok(fix) => {
                let check = Geofence::from(geo.fence()).check(fix.point);
                debug!(
                    distance = check.distance_meters,
                    within = check.within_radius,
                    "location sampled"
                );
                LocationStep {
                    position: Some(fix.point),
                    check: Some(check),
                }
            }
            Err(e) if geo.strict_mode => {
                warn!(error = %e, "location unavailable for strict geofence");
                let attempt = VerificationAttempt {
                    radius_meters: Some(geo.radius_meters),
                    ..self.empty_attempt()
                };
                return Err(VerificationError::Rejected {
                    rejection: Rejection::LocationUnavailable(e.to_string()),
                    attempt: Box::new(attempt),
                });
            }
            Err(e) => {
                warn!(error = %e, "location unavailable; geofence is lenient");
                LocationStep {
                    position: None,
                    check: None,
                }
            }
        };
        self.observer.on_location(step.position, step.check.as_ref());
        Ok(step)
    }

    async fn match_face(
        &self,
        face: &FaceConfig,
        control: &SessionControl,
    ) -> Result<FaceStep, VerificationError> {
        self.detector.load().await?;
        if !control.is_running() {
            return Err(VerificationError::Cancelled);
        }

        let session = self
            .arbiter
            .acquire(CAMERA_OWNER, &self.options.constraints)
            .await?;
        control.attach(session.stream());

        let result = self.sample_loop(face, control, &session).await;

        control.detach();
        session.release();
        result
    }

    async fn sample_loop(
        &self,
        face: &FaceConfig,
        control: &SessionControl,
        session: &CameraSession,
    ) -> Result<FaceStep, VerificationError> {
        let mut step = FaceStep {
            tally: ConsensusTally::new(face.max_attempts, face.required_successes),
            evidence: None,
            last_reason: None,
        };
        let started = Instant::now();
        let mut last_seen = Instant::now();

        while step.tally.state() == ConsensusState::Pending {
            if !control.is_running() {
                return Err(VerificationError::Cancelled);
            }
            if started.elapsed() >= self.options.session_budget {
                warn!("verification session budget exhausted");
                break;
            }

            let frame = match session.capture().await {
                Ok(frame) => frame,
                Err(_) if !control.is_running() => return Err(VerificationError::Cancelled),
                Err(e) => return Err(e.into()),
            };
            let attempt = step.tally.attempts() + 1;

            match self.detector.detect(&frame).await.and_then(select_face) {
                Ok(detected) => {
                    last_seen = Instant::now();
                    let sample = self.score(face, &detected, attempt);
                    step.tally.record_sample(sample.similarity, sample.is_match);
                    if sample.is_match {
                        let better = step
                            .evidence
                            .as_ref()
                            .map_or(true, |e| sample.similarity >= e.similarity);
                        if better {
                            step.evidence = Some(Evidence {
                                similarity: sample.similarity,
                                image: frame.image.clone(),
                                embedding: detected.embedding.clone(),
                            });
                        }
                    }
                    self.observer.on_sample(&sample);
                }
                Err(e) if e.is_transient() => {
                    debug!(attempt, reason = %e, "no usable face in frame");
                    step.tally.record_miss();
                    step.last_reason = Some(e);
                }
                Err(e) => return Err(e.into()),
            }

            if step.tally.state() != ConsensusState::Pending {
                break;
            }
            if last_seen.elapsed() >= self.options.idle_timeout {
                warn!(
                    timeout_ms = self.options.idle_timeout.as_millis() as u64,
                    "no acceptable face before idle timeout"
                );
                break;
            }
            if !control.pause(self.options.frame_interval).await {
                return Err(VerificationError::Cancelled);
            }
        }

        debug!(
            successes = step.tally.successes(),
            attempts = step.tally.attempts(),
            "face sampling finished"
        );
        Ok(step)
    }

    fn score(&self, face: &FaceConfig, detected: &DetectedFace, attempt: u32) -> FaceSample {
        let similarity = cosine_similarity(&detected.embedding, &face.reference_embedding);
        let emotion_ok = face.required_emotion.as_ref().map_or(true, |required| {
            detected
                .demographics
                .dominant_emotion
                .eq_ignore_ascii_case(required)
        });
        let matched = is_match(similarity, face.similarity_threshold) && emotion_ok;
        debug!(attempt, similarity, matched, emotion_ok, "face sample scored");
        FaceSample {
            attempt,
            similarity,
            is_match: matched,
        }
    }

    fn empty_attempt(&self) -> VerificationAttempt {
        VerificationAttempt {
            captured_embedding: None,
            similarity: None,
            is_match: false,
            successes: 0,
            attempts: 0,
            location: None,
            radius_meters: None,
            geo: None,
            overall_match: false,
            evidence_image: None,
            timestamp: self.clock.now(),
        }
    }

    fn build_attempt(
        &self,
        config: &VerificationConfig,
        location: Option<&LocationStep>,
        face: Option<&FaceStep>,
        accepted: bool,
    ) -> VerificationAttempt {
        let mut attempt = self.empty_attempt();
        attempt.overall_match = accepted;
        if let Some(geo) = &config.geo {
            attempt.radius_meters = Some(geo.radius_meters);
        }
        if let Some(step) = location {
            attempt.location = step.position;
            attempt.geo = step.check;
        }
        if let (Some(step), Some(face_config)) = (face, &config.face) {
            attempt.successes = step.tally.successes();
            attempt.attempts = step.tally.attempts();
            attempt.is_match = step.tally.successes() >= face_config.required_successes;
            attempt.similarity = step
                .tally
                .last_match_similarity()
                .or(step.tally.best_similarity());
            if let Some(evidence) = &step.evidence {
                attempt.evidence_image = Some(evidence.image.clone());
                attempt.captured_embedding = Some(evidence.embedding.clone());
            }
        }
        attempt
    }
}
