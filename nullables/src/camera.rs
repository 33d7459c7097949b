//! Nullable camera: hands out in-memory streams and records their lifecycle.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rollcall_types::{EncodedImage, PresenceError};
use rollcall_vision::{Camera, CameraConstraints, Frame, VideoStream};

/// A stream producing numbered placeholder JPEG frames.
#[derive(Default)]
pub struct NullStream {
    frames: AtomicU64,
    released: AtomicBool,
    release_calls: AtomicUsize,
}

impl NullStream {
    pub fn frames_served(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoStream for NullStream {
    async fn next_frame(&self) -> Result<Frame, PresenceError> {
        if self.is_released() {
            return Err(PresenceError::CameraUnavailable("stream released".into()));
        }
        let sequence = self.frames.fetch_add(1, Ordering::SeqCst);
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.extend_from_slice(&sequence.to_be_bytes());
        Ok(Frame {
            sequence,
            width: 640,
            height: 480,
            image: EncodedImage::jpeg(bytes),
        })
    }

    fn release(&self) {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.released.store(true, Ordering::SeqCst);
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

enum Availability {
    Available,
    Denied,
    Missing,
}

pub struct NullCamera {
    availability: Availability,
    opened: Mutex<Vec<Arc<NullStream>>>,
    acquisitions: AtomicUsize,
}

impl NullCamera {
    pub fn new() -> Self {
        Self::with(Availability::Available)
    }

    /// Every acquisition fails with `PermissionDenied`.
    pub fn denied() -> Self {
        Self::with(Availability::Denied)
    }

    /// Every acquisition fails with `CameraUnavailable`.
    pub fn unavailable() -> Self {
        Self::with(Availability::Missing)
    }

    fn with(availability: Availability) -> Self {
        Self {
            availability,
            opened: Mutex::new(Vec::new()),
            acquisitions: AtomicUsize::new(0),
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Every stream handed out so far, oldest first.
    pub fn opened(&self) -> Vec<Arc<NullStream>> {
        self.opened.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Streams not yet released.
    pub fn live_streams(&self) -> usize {
        self.opened().iter().filter(|s| !s.is_released()).count()
    }
}

impl Default for NullCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Camera for NullCamera {
    async fn acquire(
        &self,
        _constraints: &CameraConstraints,
    ) -> Result<Arc<dyn VideoStream>, PresenceError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        match self.availability {
            Availability::Denied => Err(PresenceError::PermissionDenied(
                "camera permission denied".into(),
            )),
            Availability::Missing => Err(PresenceError::CameraUnavailable(
                "no camera device".into(),
            )),
            Availability::Available => {
                let stream = Arc::new(NullStream::default());
                self.opened
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(Arc::clone(&stream));
                Ok(stream)
            }
        }
    }
}
