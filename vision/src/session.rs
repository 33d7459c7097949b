//! Exclusive camera ownership.
//!
//! Only one stream may be open at a time across every camera-bound
//! component. Acquiring through the arbiter releases any prior stream first,
//! and a [`CameraSession`] releases its stream when dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rollcall_types::PresenceError;
use tracing::debug;

use crate::camera::{Camera, CameraConstraints, Frame, VideoStream};

pub struct CameraArbiter {
    camera: Arc<dyn Camera>,
    current: Mutex<Option<Lease>>,
    next_id: AtomicU64,
}

struct Lease {
    id: u64,
    owner: String,
    stream: Arc<dyn VideoStream>,
}

impl CameraArbiter {
    pub fn new(camera: Arc<dyn Camera>) -> Arc<Self> {
        Arc::new(Self {
            camera,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Open a stream for `owner`, releasing whichever stream is currently held.
    pub async fn acquire(
        self: &Arc<Self>,
        owner: &str,
        constraints: &CameraConstraints,
    ) -> Result<CameraSession, PresenceError> {
        self.release_current();

        let stream = self.camera.acquire(constraints).await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // A concurrent acquire may have completed while we awaited; the newer
        // lease wins and the displaced stream is released.
        let displaced = self
            .lock()
            .replace(Lease {
                id,
                owner: owner.to_string(),
                stream: Arc::clone(&stream),
            });
        if let Some(prev) = displaced {
            debug!(owner = %prev.owner, "camera stream displaced");
            prev.stream.release();
        }

        debug!(owner, id, "camera stream acquired");
        Ok(CameraSession {
            id,
            stream,
            arbiter: Arc::clone(self),
        })
    }

    /// Release whichever stream is currently held, if any.
    pub fn release_current(&self) {
        let lease = self.lock().take();
        if let Some(lease) = lease {
            debug!(owner = %lease.owner, id = lease.id, "camera stream released");
            lease.stream.release();
        }
    }

    pub fn is_held(&self) -> bool {
        self.lock().is_some()
    }

    /// Owner of the currently held stream.
    pub fn holder(&self) -> Option<String> {
        self.lock().as_ref().map(|l| l.owner.clone())
    }

    fn release_lease(&self, id: u64) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|l| l.id == id) {
            current.take();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Lease>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A stream held through the arbiter.
pub struct CameraSession {
    id: u64,
    stream: Arc<dyn VideoStream>,
    arbiter: Arc<CameraArbiter>,
}

impl CameraSession {
    /// Capture one frame. A released or displaced stream reports
    /// `CameraUnavailable`.
    pub async fn capture(&self) -> Result<Frame, PresenceError> {
        if self.stream.is_released() {
            return Err(PresenceError::CameraUnavailable(
                "camera stream was released".into(),
            ));
        }
        self.stream.next_frame().await
    }

    /// The underlying stream, for attaching to a [`crate::SessionControl`].
    pub fn stream(&self) -> Arc<dyn VideoStream> {
        Arc::clone(&self.stream)
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_released()
    }

    pub fn release(&self) {
        self.stream.release();
        self.arbiter.release_lease(self.id);
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}
