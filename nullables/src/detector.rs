//! Scripted face model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rollcall_types::PresenceError;
use rollcall_vision::{DetectedFace, FaceDetector, Frame};

type Outcome = Result<Vec<DetectedFace>, PresenceError>;

/// Returns scripted detection results in order, then the fallback forever.
///
/// The default fallback is an empty frame (no face).
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Outcome>,
    load_error: Option<PresenceError>,
    load_calls: AtomicUsize,
    detect_calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(Vec::new())),
            load_error: None,
            load_calls: AtomicUsize::new(0),
            detect_calls: AtomicUsize::new(0),
        }
    }

    /// Script one single-face frame per entry.
    pub fn with_faces(faces: impl IntoIterator<Item = DetectedFace>) -> Self {
        let detector = Self::new();
        for face in faces {
            detector.push_faces(vec![face]);
        }
        detector
    }

    /// `load()` fails with `error`.
    pub fn failing_load(mut self, error: PresenceError) -> Self {
        self.load_error = Some(error);
        self
    }

    /// Result returned once the script runs out.
    pub fn repeat(self, outcome: Outcome) -> Self {
        *self.fallback.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
        self
    }

    pub fn push_faces(&self, faces: Vec<DetectedFace>) {
        self.push(Ok(faces));
    }

    pub fn push_empty(&self) {
        self.push(Ok(Vec::new()));
    }

    pub fn push_error(&self, error: PresenceError) {
        self.push(Err(error));
    }

    fn push(&self, outcome: Outcome) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ScriptedDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceDetector for ScriptedDetector {
    async fn load(&self) -> Result<(), PresenceError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        match &self.load_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, PresenceError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(outcome) => outcome,
            None => self.fallback.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}
