//! Enrollment controller: drives the capture loop and emits a profile.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use rollcall_types::{Demographics, EncodedImage, Embedding, FaceProfile, Pose, PresenceError};
use rollcall_vision::{
    select_face, CameraArbiter, CameraSession, DetectedFace, FaceDetector, Frame, SessionControl,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::alignment::is_aligned;
use crate::config::{EnrollmentConfig, EnrollmentMode, ReferencePolicy};
use crate::error::EnrollmentError;
use crate::state::EnrollmentState;

/// Rendering hooks. The controller never touches a UI directly.
pub trait EnrollmentObserver: Send + Sync {
    fn on_state_change(&self, _state: &EnrollmentState) {}

    fn on_capture(&self, _pose: Pose, _face: &DetectedFace, _frame: &Frame) {}
}

pub struct NoopObserver;

impl EnrollmentObserver for NoopObserver {}

/// Camera owner label used with the [`CameraArbiter`].
const CAMERA_OWNER: &str = "enrollment";

/// Poses captured so far plus the metadata taken at the straight pose.
#[derive(Default)]
struct Captures {
    poses: BTreeMap<Pose, Embedding>,
    demographics: Option<Demographics>,
    snapshot: Option<EncodedImage>,
}

impl Captures {
    fn dimension(&self) -> Option<usize> {
        self.poses.values().next().map(Embedding::len)
    }
}

/// Runs one enrollment session. A controller is single-use: create a new
/// one for every session.
pub struct EnrollmentController {
    owner: String,
    arbiter: Arc<CameraArbiter>,
    detector: Arc<dyn FaceDetector>,
    config: EnrollmentConfig,
    observer: Arc<dyn EnrollmentObserver>,
    control: SessionControl,
    state: Mutex<EnrollmentState>,
}

impl EnrollmentController {
    pub fn new(
        owner: impl Into<String>,
        arbiter: Arc<CameraArbiter>,
        detector: Arc<dyn FaceDetector>,
        config: EnrollmentConfig,
    ) -> Self {
        Self {
            owner: owner.into(),
            arbiter,
            detector,
            config,
            observer: Arc::new(NoopObserver),
            control: SessionControl::new(),
            state: Mutex::new(EnrollmentState::Idle),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn EnrollmentObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Handle for cancelling the session (e.g. on hold-button release).
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn cancel(&self) {
        self.control.stop();
    }

    pub fn state(&self) -> EnrollmentState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Run the session to a terminal state.
    ///
    /// On success the returned profile is the only thing produced; on any
    /// failure no profile is committed and the camera is released.
    pub async fn run(&self, mode: EnrollmentMode) -> Result<FaceProfile, EnrollmentError> {
        if self.state() != EnrollmentState::Idle {
            return Err(EnrollmentError::InvalidConfig(
                "enrollment session already used".into(),
            ));
        }
        if let Err(e) = self.config.validate() {
            return Err(self.fail(e));
        }

        self.transition(EnrollmentState::Preparing);
        let captures = match self.seed(&mode) {
            Ok(c) => c,
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = self.detector.load().await {
            return Err(self.fail(e.into()));
        }
        if !self.control.is_running() {
            return Err(self.fail(EnrollmentError::Cancelled));
        }

        let session = match self
            .arbiter
            .acquire(CAMERA_OWNER, &self.config.constraints)
            .await
        {
            Ok(s) => s,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.control.attach(session.stream());

        let result = self
            .capture_remaining(&session, captures, mode.keep())
            .await
            .and_then(|captures| self.build_profile(captures));

        self.control.detach();
        session.release();

        match result {
            Ok(profile) => {
                info!(owner = %self.owner, poses = profile.poses.len(), "enrollment completed");
                self.transition(EnrollmentState::Completed);
                Ok(profile)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn seed(&self, mode: &EnrollmentMode) -> Result<Captures, EnrollmentError> {
        let EnrollmentMode::Update { previous, keep } = mode else {
            return Ok(Captures::default());
        };
        if *keep > self.config.poses.len() {
            return Err(EnrollmentError::InvalidConfig(format!(
                "cannot keep {keep} of {} poses",
                self.config.poses.len()
            )));
        }
        let mut captures = Captures::default();
        for pose in &self.config.poses[..*keep] {
            let embedding = previous.poses.get(pose).ok_or_else(|| {
                EnrollmentError::InvalidConfig(format!("stored profile has no {pose} pose"))
            })?;
            captures.poses.insert(*pose, embedding.clone());
            if *pose == Pose::Straight {
                captures.demographics = Some(previous.demographics.clone());
                captures.snapshot = previous.capture_image.clone();
            }
        }
        debug!(owner = %self.owner, kept = keep, "seeded enrollment from stored profile");
        Ok(captures)
    }

    async fn capture_remaining(
        &self,
        session: &CameraSession,
        mut captures: Captures,
        keep: usize,
    ) -> Result<Captures, EnrollmentError> {
        let started = Instant::now();
        let total = self.config.poses.len();

        for (index, pose) in self.config.poses.iter().copied().enumerate().skip(keep) {
            self.transition(EnrollmentState::Capturing { pose, index, total });
            let mut last_seen = Instant::now();

            loop {
                if !self.control.is_running() {
                    return Err(EnrollmentError::Cancelled);
                }
                if started.elapsed() >= self.config.session_budget {
                    return Err(EnrollmentError::SessionTimeout(
                        self.config.session_budget.as_millis() as u64,
                    ));
                }

                let frame = match session.capture().await {
                    Ok(frame) => frame,
                    Err(_) if !self.control.is_running() => return Err(EnrollmentError::Cancelled),
                    Err(e) => return Err(e.into()),
                };

                match self.detector.detect(&frame).await.and_then(select_face) {
                    Ok(face) => {
                        last_seen = Instant::now();
                        if is_aligned(pose, face.rotation) {
                            self.record(&mut captures, pose, &face, &frame)?;
                            if !self.control.pause(self.config.capture_debounce).await {
                                return Err(EnrollmentError::Cancelled);
                            }
                            break;
                        }
                    }
                    Err(e) if e.is_transient() => {}
                    Err(e) => return Err(e.into()),
                }

                if last_seen.elapsed() >= self.config.idle_timeout {
                    warn!(owner = %self.owner, %pose, "no acceptable face before idle timeout");
                    return Err(EnrollmentError::PoseTimeout {
                        pose,
                        timeout_ms: self.config.idle_timeout.as_millis() as u64,
                    });
                }
                if !self.control.pause(self.config.frame_interval).await {
                    return Err(EnrollmentError::Cancelled);
                }
            }
        }
        Ok(captures)
    }

    fn record(
        &self,
        captures: &mut Captures,
        pose: Pose,
        face: &DetectedFace,
        frame: &Frame,
    ) -> Result<(), EnrollmentError> {
        if let Some(expected) = captures.dimension() {
            if face.embedding.len() != expected {
                return Err(PresenceError::InvalidConfig(format!(
                    "detector produced a {}-dim embedding, expected {expected}",
                    face.embedding.len()
                ))
                .into());
            }
        }
        captures.poses.insert(pose, face.embedding.clone());
        if pose == Pose::Straight {
            captures.demographics = Some(face.demographics.clone());
            captures.snapshot = Some(frame.image.clone());
        }
        debug!(owner = %self.owner, %pose, confidence = face.confidence, "pose captured");
        self.observer.on_capture(pose, face, frame);
        Ok(())
    }

    fn build_profile(&self, captures: Captures) -> Result<FaceProfile, EnrollmentError> {
        let mut profile = FaceProfile::from_poses(self.owner.clone(), captures.poses)?
            .with_demographics(captures.demographics.unwrap_or_default())
            .with_emotion_match(self.config.require_emotion_match);
        if let Some(snapshot) = captures.snapshot {
            profile = profile.with_capture(snapshot);
        }
        if self.config.reference_policy == ReferencePolicy::MeanOfPoses {
            let mean = Embedding::mean(profile.poses.values()).ok_or_else(|| {
                EnrollmentError::InvalidConfig("cannot average captured poses".into())
            })?;
            profile = profile.with_reference(mean)?;
        }
        Ok(profile)
    }

    fn transition(&self, next: EnrollmentState) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.can_transition_to(&next) {
                warn!(from = ?*state, to = ?next, "ignoring illegal enrollment transition");
                return;
            }
            *state = next.clone();
        }
        debug!(owner = %self.owner, state = ?next, "enrollment state changed");
        self.observer.on_state_change(&next);
    }

    /// Move to `Cancelled` or `Failed`, making sure the camera is released.
    fn fail(&self, error: EnrollmentError) -> EnrollmentError {
        self.control.stop();
        let next = if error == EnrollmentError::Cancelled {
            info!(owner = %self.owner, "enrollment cancelled");
            EnrollmentState::Cancelled
        } else {
            warn!(owner = %self.owner, %error, "enrollment failed");
            EnrollmentState::Failed(error.clone())
        };
        self.transition(next);
        error
    }
}
