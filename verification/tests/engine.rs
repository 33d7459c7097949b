//! Verification sessions against scripted devices.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rollcall_backend::{BackendError, ScopePolicy, TokenResolution};
use rollcall_enrollment::{EnrollmentConfig, EnrollmentController, EnrollmentMode};
use rollcall_geo::GeofenceCheck;
use rollcall_nullables::{
    basis_embedding, face, posed_face, NullCamera, NullClock, NullGeolocator, NullScheduleBackend,
    ScriptedDetector,
};
use rollcall_types::{Embedding, GeoPoint, GeofenceProfile, Pose, PresenceError, ScopeId, Timestamp};
use rollcall_verification::{
    EngineOptions, FaceConfig, FaceSample, GeoConfig, Rejection, VerificationConfig,
    VerificationEngine, VerificationError, VerificationObserver,
};
use rollcall_vision::{CameraArbiter, DetectedFace};

const OFFICE: (f64, f64) = (-6.2, 106.8166);
/// About 150 m due south of the office.
const ACROSS_THE_ROAD: (f64, f64) = (-6.201349, 106.8166);

#[derive(Default)]
struct Recorder {
    samples: Mutex<Vec<FaceSample>>,
    locations: Mutex<Vec<Option<GeofenceCheck>>>,
}

impl VerificationObserver for Recorder {
    fn on_location(&self, _position: Option<GeoPoint>, check: Option<&GeofenceCheck>) {
        self.locations.lock().unwrap().push(check.copied());
    }

    fn on_sample(&self, sample: &FaceSample) {
        self.samples.lock().unwrap().push(sample.clone());
    }
}

fn point((lat, lng): (f64, f64)) -> GeoPoint {
    GeoPoint::new(lat, lng).unwrap()
}

fn engine(camera: &Arc<NullCamera>, detector: &Arc<ScriptedDetector>) -> VerificationEngine {
    VerificationEngine::new(CameraArbiter::new(camera.clone()), detector.clone())
}

/// Matching faces use the reference itself; misses use an orthogonal axis.
fn frames(pattern: &[bool]) -> Vec<DetectedFace> {
    pattern
        .iter()
        .map(|&hit| face(if hit { basis_embedding(0) } else { basis_embedding(1) }))
        .collect()
}

/// A face whose similarity to `basis_embedding(0)` is exactly `cos`.
fn face_at(cos: f32) -> DetectedFace {
    let mut values = vec![0.0; 128];
    values[0] = cos;
    values[1] = (1.0 - cos * cos).sqrt();
    face(Embedding::new(values))
}

fn strict_geo() -> GeoConfig {
    GeoConfig::new(point(OFFICE), 100.0)
}

#[tokio::test(start_paused = true)]
async fn three_of_five_stops_after_the_third_match() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces([
        face_at(0.9),
        face_at(0.2),
        face_at(0.8),
        face_at(0.75),
        face_at(0.95),
    ]));
    let recorder = Arc::new(Recorder::default());
    let engine = engine(&camera, &detector).with_observer(recorder.clone());

    let started = tokio::time::Instant::now();
    let attempt = engine
        .verify(&VerificationConfig::face_only(FaceConfig::new(basis_embedding(0))))
        .await
        .unwrap();

    // Four frames, three inter-frame pauses, none after the decision.
    let interval = EngineOptions::default().frame_interval;
    assert!(started.elapsed() >= interval * 3, "{:?}", started.elapsed());
    assert!(started.elapsed() < interval * 4, "{:?}", started.elapsed());
    assert_eq!(detector.detect_calls(), 4);
    assert_eq!(attempt.attempts, 4);
    assert_eq!(attempt.successes, 3);
    assert!(attempt.is_match);
    assert!(attempt.overall_match);
    assert!((attempt.similarity.unwrap() - 0.75).abs() < 1e-6);
    assert_eq!(attempt.to_record().accuracy, "75.00%");
    let matched: Vec<bool> = recorder.samples.lock().unwrap().iter().map(|s| s.is_match).collect();
    assert_eq!(matched, vec![true, false, true, true]);
    assert_eq!(camera.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn evidence_is_the_best_matching_frame() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces([
        face_at(0.8),
        face_at(0.99),
        face_at(0.9),
    ]));
    let attempt = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(FaceConfig::new(basis_embedding(0))))
        .await
        .unwrap();

    // Frames are numbered from zero; the second capture carries sequence 1.
    let evidence = attempt.evidence_image.unwrap();
    assert_eq!(&evidence.bytes[4..], &1u64.to_be_bytes());
    assert!(attempt.captured_embedding.is_some());
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_is_no_match() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[
        true, false, false, true, false,
    ])));

    let err = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(FaceConfig::new(basis_embedding(0))))
        .await
        .unwrap_err();

    match &err {
        VerificationError::Rejected {
            rejection: Rejection::NoMatch {
                successes,
                required,
                attempts,
                ..
            },
            attempt,
        } => {
            assert_eq!((*successes, *required, *attempts), (2, 3, 5));
            assert!(!attempt.overall_match);
            assert_eq!(attempt.to_record().is_verified, 0);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(detector.detect_calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn frames_without_faces_count_against_the_budget() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::new());

    let err = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(FaceConfig::new(basis_embedding(0))))
        .await
        .unwrap_err();

    match err {
        VerificationError::Rejected {
            rejection:
                Rejection::NoMatch {
                    attempts,
                    last_reason,
                    ..
                },
            attempt,
        } => {
            assert_eq!(attempts, 5);
            assert_eq!(last_reason, Some(PresenceError::NoFaceDetected));
            assert_eq!(attempt.similarity, None);
            assert_eq!(attempt.to_record().accuracy, "");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_ends_a_faceless_session() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::new());
    let mut face = FaceConfig::new(basis_embedding(0));
    face.max_attempts = 100;
    let started = tokio::time::Instant::now();

    let err = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(face))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::Rejected {
            rejection: Rejection::NoMatch { .. },
            ..
        }
    ));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(3500), "{elapsed:?}");
    assert_eq!(camera.live_streams(), 0);
}

#[tokio::test(start_paused = true)]
async fn strict_geofence_rejects_before_the_camera_opens() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[true; 5])));
    let locator = Arc::new(NullGeolocator::at(point(ACROSS_THE_ROAD)));
    let engine = engine(&camera, &detector).with_geolocator(locator.clone());
    let config = VerificationConfig {
        face: Some(FaceConfig::new(basis_embedding(0))),
        geo: Some(strict_geo()),
    };

    let err = engine.verify(&config).await.unwrap_err();

    match &err {
        VerificationError::Rejected {
            rejection:
                Rejection::GeoRejected {
                    distance_meters,
                    radius_meters,
                },
            attempt,
        } => {
            assert!((distance_meters - 150.0).abs() < 1.0, "{distance_meters}");
            assert_eq!(*radius_meters, 100.0);
            let record = attempt.to_record();
            assert_eq!(record.in_radius, 0);
            assert_eq!(record.location, "-6.201349,106.8166");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(locator.calls(), 1);
    assert_eq!(detector.load_calls(), 0);
    assert_eq!(detector.detect_calls(), 0);
    assert_eq!(camera.acquisitions(), 0);
}

#[tokio::test(start_paused = true)]
async fn lenient_geofence_records_but_does_not_block() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[true; 3])));
    let recorder = Arc::new(Recorder::default());
    let engine = engine(&camera, &detector)
        .with_geolocator(Arc::new(NullGeolocator::at(point(ACROSS_THE_ROAD))))
        .with_observer(recorder.clone());
    let config = VerificationConfig {
        face: Some(FaceConfig::new(basis_embedding(0))),
        geo: Some(GeoConfig {
            strict_mode: false,
            ..strict_geo()
        }),
    };

    let attempt = engine.verify(&config).await.unwrap();

    assert!(attempt.overall_match);
    assert!(!attempt.within_radius());
    assert_eq!(attempt.to_record().radius, 100.0);
    let locations = recorder.locations.lock().unwrap();
    assert_eq!(locations.len(), 1);
    assert!(!locations[0].unwrap().within_radius);
}

#[tokio::test(start_paused = true)]
async fn strict_geofence_without_a_fix_is_location_unavailable() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[true; 3])));
    let engine = engine(&camera, &detector).with_geolocator(Arc::new(
        NullGeolocator::at(point(OFFICE)).delayed(Duration::from_secs(30)),
    ));

    let err = engine
        .verify(&VerificationConfig::geo_only(strict_geo()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::Rejected {
            rejection: Rejection::LocationUnavailable(_),
            ..
        }
    ));
    assert_eq!(camera.acquisitions(), 0);
}

#[tokio::test(start_paused = true)]
async fn lenient_geofence_without_a_fix_still_verifies_the_face() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[true; 3])));
    let engine = engine(&camera, &detector).with_geolocator(Arc::new(NullGeolocator::failing(
        PresenceError::GeolocationUnavailable("denied".into()),
    )));
    let config = VerificationConfig {
        face: Some(FaceConfig::new(basis_embedding(0))),
        geo: Some(GeoConfig {
            strict_mode: false,
            ..strict_geo()
        }),
    };

    let attempt = engine.verify(&config).await.unwrap();

    let record = attempt.to_record();
    assert_eq!(record.is_verified, 1);
    assert_eq!(record.location, "");
    assert_eq!(record.in_radius, 0);
}

#[tokio::test(start_paused = true)]
async fn inside_the_geofence_geo_only_passes() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::new());
    let engine = engine(&camera, &detector)
        .with_geolocator(Arc::new(NullGeolocator::at(point(OFFICE))));

    let attempt = engine
        .verify(&VerificationConfig::geo_only(strict_geo()))
        .await
        .unwrap();

    assert!(attempt.within_radius());
    assert_eq!(attempt.to_record().accuracy, "");
    assert_eq!(detector.load_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn lenient_face_never_blocks() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[false; 5])));
    let mut face = FaceConfig::new(basis_embedding(0));
    face.strict_mode = false;

    let attempt = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(face))
        .await
        .unwrap();

    assert!(attempt.overall_match);
    assert!(!attempt.is_match);
    assert_eq!(attempt.successes, 0);
}

#[tokio::test(start_paused = true)]
async fn lenient_accuracy_without_a_match_is_the_best_similarity() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces([
        face_at(0.3),
        face_at(0.5),
        face_at(0.4),
        face_at(0.1),
        face_at(0.2),
    ]));
    let mut face = FaceConfig::new(basis_embedding(0));
    face.strict_mode = false;

    let attempt = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(face))
        .await
        .unwrap();

    assert!(!attempt.is_match);
    assert!(attempt.evidence_image.is_none());
    assert_eq!(attempt.to_record().accuracy, "50.00%");
}

#[tokio::test(start_paused = true)]
async fn emotion_gate_rejects_otherwise_matching_faces() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[true; 5])));
    let mut face = FaceConfig::new(basis_embedding(0));
    face.required_emotion = Some("happy".into());

    let err = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(face))
        .await
        .unwrap_err();

    match err {
        VerificationError::Rejected { attempt, .. } => {
            assert_eq!(attempt.successes, 0);
            // Similarity is still reported from the best frame.
            assert_eq!(attempt.to_record().accuracy, "100.00%");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn denied_camera_is_fatal() {
    let camera = Arc::new(NullCamera::denied());
    let detector = Arc::new(ScriptedDetector::new());

    let err = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(FaceConfig::new(basis_embedding(0))))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::Presence(PresenceError::PermissionDenied(_))
    ));
    assert_eq!(detector.detect_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn model_load_failure_skips_the_camera() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(
        ScriptedDetector::new()
            .failing_load(PresenceError::ModelLoadFailure("weights missing".into())),
    );

    let err = engine(&camera, &detector)
        .verify(&VerificationConfig::face_only(FaceConfig::new(basis_embedding(0))))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::Presence(PresenceError::ModelLoadFailure(_))
    ));
    assert_eq!(camera.acquisitions(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_config_is_rejected_up_front() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::new());

    let err = engine(&camera, &detector)
        .verify(&VerificationConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::Presence(PresenceError::InvalidConfig(_))
    ));
    assert_eq!(detector.load_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_releases_the_camera() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::new());
    let mut face = FaceConfig::new(basis_embedding(0));
    face.max_attempts = 100;
    let engine = Arc::new(engine(&camera, &detector));

    let task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.verify(&VerificationConfig::face_only(face)).await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;
    engine.cancel();
    assert_eq!(camera.live_streams(), 0);

    let result = task.await.unwrap();
    assert_eq!(result.unwrap_err(), VerificationError::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn record_timestamp_comes_from_the_clock() {
    let camera = Arc::new(NullCamera::new());
    let detector = Arc::new(ScriptedDetector::with_faces(frames(&[true; 3])));
    let clock = Arc::new(NullClock::new(Timestamp::from_secs(1_709_622_489)));

    let attempt = engine(&camera, &detector)
        .with_clock(clock)
        .with_options(EngineOptions {
            frame_interval: Duration::from_millis(50),
            ..EngineOptions::default()
        })
        .verify(&VerificationConfig::face_only(FaceConfig::new(basis_embedding(0))))
        .await
        .unwrap();

    assert_eq!(attempt.to_record().timestamp, "2024-03-05 07:08:09");
}

#[tokio::test(start_paused = true)]
async fn token_resolves_to_a_verification() {
    let camera = Arc::new(NullCamera::new());
    let enroll_detector = Arc::new(ScriptedDetector::with_faces([
        posed_face(Pose::Straight, basis_embedding(3)),
        posed_face(Pose::Left, basis_embedding(4)),
        posed_face(Pose::Right, basis_embedding(5)),
    ]));
    let arbiter = CameraArbiter::new(camera.clone());
    let profile = EnrollmentController::new(
        "emp-7",
        arbiter.clone(),
        enroll_detector,
        EnrollmentConfig::with_poses(vec![Pose::Straight, Pose::Left, Pose::Right]),
    )
    .run(EnrollmentMode::Fresh)
    .await
    .unwrap();

    let backend = NullScheduleBackend::new().with_token(
        "tok-1",
        TokenResolution {
            scope_id: ScopeId::new("sched-1"),
            owner: "emp-7".into(),
            face: Some(profile.to_record()),
            geofence: Some(GeofenceProfile {
                latitude: OFFICE.0,
                longitude: OFFICE.1,
                radius_meters: 100.0,
            }),
            require_emotion_match: false,
            policy: ScopePolicy {
                required_successes: 1,
                max_attempts: 1,
                ..ScopePolicy::default()
            },
        },
    );
    let verify_detector = Arc::new(ScriptedDetector::with_faces([face(basis_embedding(3))]));
    let engine = VerificationEngine::new(arbiter, verify_detector.clone())
        .with_geolocator(Arc::new(NullGeolocator::at(point(OFFICE))));

    let attempt = engine.verify_token(&backend, "tok-1").await.unwrap();
    let record = attempt.to_record();
    assert_eq!(record.is_verified, 1);
    assert_eq!(record.accuracy, "100.00%");
    assert_eq!(record.in_radius, 1);
    assert_eq!(verify_detector.detect_calls(), 1);

    let unknown = engine.verify_token(&backend, "tok-2").await.unwrap_err();
    assert!(matches!(
        unknown,
        VerificationError::Backend(BackendError::TokenNotFound(_))
    ));
}
