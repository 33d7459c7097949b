//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rollcall_backend::HttpBackend;
use rollcall_broadcast::{BroadcastEvent, PresenceBroadcaster, StopReason, WsPushTransport};
use rollcall_geo::{haversine_meters, Geofence};
use rollcall_types::{Embedding, FaceProfile, FaceProfileRecord, GeoPoint, GeofenceProfile};
use rollcall_utils::{format_duration, format_meters, format_percent};
use rollcall_verification::{cosine_similarity, is_match};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::shutdown::ShutdownController;

/// Time allowed for in-flight stop deliveries before exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(20);

/// Broadcast tokens for the configured scopes until a signal or the
/// inactivity monitor stops the schedule.
pub async fn run_broadcast(
    config: &DaemonConfig,
    shutdown: &ShutdownController,
) -> anyhow::Result<()> {
    config.validate()?;
    let scopes = config.scope_ids();
    let push_url = config
        .push_url
        .as_deref()
        .ok_or_else(|| DaemonError::Config("push_url is required to broadcast".into()))?;

    let backend = Arc::new(
        HttpBackend::with_timeout(config.backend_url.as_str(), config.request_timeout())
            .with_retry(config.retry_policy()),
    );
    let transport = Arc::new(WsPushTransport::connect(push_url).await?);
    let broadcaster = Arc::new(PresenceBroadcaster::new(
        config.broadcaster_config(),
        backend.clone(),
        transport,
    ));

    let mut events = broadcaster.subscribe_events();
    let mut signals = shutdown.subscribe();
    if let Err(e) = broadcaster.load(&scopes).await {
        // A partial load has already sent its stop; let it reach the backend.
        if !broadcaster.is_stopped() {
            broadcaster.stop(StopReason::LoadFailed);
        }
        if !backend.drain_pending(DRAIN_TIMEOUT).await {
            warn!("exiting with undelivered stop signals");
        }
        return Err(e.into());
    }
    info!(
        scopes = scopes.len(),
        backend = backend.base_url(),
        inactivity = %format_duration(config.inactivity_threshold_secs),
        "broadcast started"
    );

    loop {
        tokio::select! {
            signal = signals.recv() => {
                let Ok(event) = signal else { break };
                if !broadcaster.handle_page_event(event) {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(BroadcastEvent::TokenRotated(token)) => {
                    info!(scope = %token.scope_id, issued_at = %token.issued_at, "token rotated");
                }
                Ok(BroadcastEvent::Revealed(scope)) => debug!(scope = %scope, "token revealed"),
                Ok(BroadcastEvent::Stopped { reason, scopes }) => {
                    info!(?reason, scopes = scopes.len(), "broadcast stopped");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event bus lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    if !broadcaster.is_stopped() {
        broadcaster.stop(StopReason::Requested);
    }
    if !backend.drain_pending(DRAIN_TIMEOUT).await {
        warn!("exiting with undelivered stop signals");
    }
    info!(stats = ?broadcaster.stats(), "rollcall exited cleanly");
    Ok(())
}

/// A stored profile document: either or both of the owner's profiles.
#[derive(Debug, Deserialize)]
pub struct ProfileDocument {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub face: Option<FaceProfileRecord>,
    #[serde(default)]
    pub geofence: Option<GeofenceProfile>,
}

/// Validate a profile document and describe what it contains.
pub fn check_profile(json: &str) -> Result<Vec<String>, DaemonError> {
    let document: ProfileDocument = serde_json::from_str(json)?;
    if document.face.is_none() && document.geofence.is_none() {
        return Err(DaemonError::Profile("neither face nor geofence present".into()));
    }
    let owner = document.owner.unwrap_or_else(|| "unknown".to_string());
    let mut report = vec![format!("owner: {owner}")];

    if let Some(record) = document.face {
        let profile = FaceProfile::from_record(owner.clone(), record)
            .map_err(|e| DaemonError::Profile(e.to_string()))?;
        let poses: Vec<String> = profile.poses.keys().map(|p| p.to_string()).collect();
        report.push(format!(
            "face: {} poses ({}), reference {} dims",
            poses.len(),
            poses.join(", "),
            profile.reference_embedding.len()
        ));
        report.push(format!(
            "demographics: age {:.0}, {}, {}",
            profile.demographics.age,
            profile.demographics.gender,
            profile.demographics.dominant_emotion
        ));
        if profile.capture_image.is_none() {
            report.push("capture: none".to_string());
        }
    }

    if let Some(fence) = document.geofence {
        fence
            .validate()
            .map_err(|e| DaemonError::Profile(e.to_string()))?;
        report.push(format!(
            "geofence: {} radius {}",
            fence.center(),
            format_meters(fence.radius_meters)
        ));
    }
    Ok(report)
}

pub fn check_profile_file(path: &Path) -> Result<Vec<String>, DaemonError> {
    check_profile(&std::fs::read_to_string(path)?)
}

/// Compare two embeddings stored as JSON arrays.
pub fn similarity_report(a: &str, b: &str, threshold: f64) -> Result<String, DaemonError> {
    let a: Embedding = serde_json::from_str(a)?;
    let b: Embedding = serde_json::from_str(b)?;
    for embedding in [&a, &b] {
        embedding
            .validate()
            .map_err(|e| DaemonError::Profile(e.to_string()))?;
    }
    let similarity = cosine_similarity(&a, &b);
    Ok(format!(
        "similarity {similarity:.4} ({}), {} at threshold {threshold:.2}",
        format_percent(similarity),
        if is_match(similarity, threshold) { "match" } else { "no match" }
    ))
}

pub fn similarity_files(a: &Path, b: &Path, threshold: f64) -> Result<String, DaemonError> {
    similarity_report(
        &std::fs::read_to_string(a)?,
        &std::fs::read_to_string(b)?,
        threshold,
    )
}

/// Great-circle distance, optionally tested against a radius around `from`.
pub fn distance_report(
    from: GeoPoint,
    to: GeoPoint,
    radius_meters: Option<f64>,
) -> Result<String, DaemonError> {
    let distance = haversine_meters(from, to);
    let mut line = format!("distance {}", format_meters(distance));
    if let Some(radius) = radius_meters {
        let fence = Geofence::new(from, radius).map_err(|e| DaemonError::Profile(e.to_string()))?;
        let check = fence.check(to);
        line.push_str(&format!(
            ", {} radius {}",
            if check.within_radius { "within" } else { "outside" },
            format_meters(radius)
        ));
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding_json(axis: usize) -> String {
        let mut values = vec![0.0f32; 128];
        values[axis] = 1.0;
        serde_json::to_string(&values).unwrap()
    }

    #[test]
    fn profile_report_lists_poses_and_geofence() {
        let json = format!(
            r#"{{
                "owner": "emp-7",
                "face": {{
                    "poses": {{ "straight": {0}, "left": {0} }},
                    "age": 31.4, "gender": "female", "emotion": "neutral"
                }},
                "geofence": {{ "latitude": -6.2, "longitude": 106.8166, "radius": 100 }}
            }}"#,
            embedding_json(0)
        );
        let report = check_profile(&json).unwrap();
        assert_eq!(report[0], "owner: emp-7");
        assert!(report[1].starts_with("face: 2 poses"), "{}", report[1]);
        assert!(report[1].ends_with("reference 128 dims"));
        assert_eq!(report.last().unwrap(), "geofence: -6.2,106.8166 radius 100.00 m");
    }

    #[test]
    fn profile_without_straight_pose_fails() {
        let json = format!(r#"{{ "face": {{ "poses": {{ "left": {} }} }} }}"#, embedding_json(0));
        assert!(matches!(check_profile(&json), Err(DaemonError::Profile(_))));
    }

    #[test]
    fn empty_profile_document_fails() {
        assert!(matches!(check_profile("{}"), Err(DaemonError::Profile(_))));
        assert!(matches!(check_profile("not json"), Err(DaemonError::Json(_))));
    }

    #[test]
    fn identical_embeddings_match() {
        let report = similarity_report(&embedding_json(0), &embedding_json(0), 0.7).unwrap();
        assert_eq!(report, "similarity 1.0000 (100.00%), match at threshold 0.70");
        let report = similarity_report(&embedding_json(0), &embedding_json(1), 0.7).unwrap();
        assert!(report.ends_with("no match at threshold 0.70"), "{report}");
    }

    #[test]
    fn short_embedding_is_rejected() {
        assert!(similarity_report("[1.0, 0.0]", &embedding_json(0), 0.7).is_err());
    }

    #[test]
    fn distance_reports_radius_check() {
        let office: GeoPoint = "-6.2,106.8166".parse().unwrap();
        let across: GeoPoint = "-6.201349,106.8166".parse().unwrap();
        let line = distance_report(office, across, Some(100.0)).unwrap();
        assert!(line.starts_with("distance 150."), "{line}");
        assert!(line.ends_with("outside radius 100.00 m"), "{line}");
        assert_eq!(distance_report(office, office, None).unwrap(), "distance 0.00 m");
    }
}
