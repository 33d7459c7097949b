//! Cooperative cancellation for capture loops.
//!
//! A loop checks [`SessionControl::is_running`] before scheduling its next
//! iteration and sleeps through [`SessionControl::pause`], which wakes early
//! on stop. Stopping also releases the attached camera stream synchronously,
//! so a stream is never left open while the loop unwinds.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::camera::VideoStream;

#[derive(Clone)]
pub struct SessionControl {
    inner: Arc<ControlInner>,
}

struct ControlInner {
    running: watch::Sender<bool>,
    stream: Mutex<Option<Arc<dyn VideoStream>>>,
}

impl SessionControl {
    pub fn new() -> Self {
        let (running, _) = watch::channel(true);
        Self {
            inner: Arc::new(ControlInner {
                running,
                stream: Mutex::new(None),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    /// Flip the running flag and release any attached stream.
    pub fn stop(&self) {
        self.inner.running.send_replace(false);
        let stream = self
            .inner
            .stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(stream) = stream {
            stream.release();
        }
    }

    /// Attach the stream to release on stop. Releases it at once if the
    /// session was already stopped.
    pub fn attach(&self, stream: Arc<dyn VideoStream>) {
        if !self.is_running() {
            stream.release();
            return;
        }
        *self.inner.stream.lock().unwrap_or_else(|e| e.into_inner()) = Some(stream);
    }

    pub fn detach(&self) {
        self.inner
            .stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Sleep for `duration` or until stopped. Returns whether the session is
    /// still running.
    pub async fn pause(&self, duration: Duration) -> bool {
        let mut rx = self.inner.running.subscribe();
        if !*rx.borrow_and_update() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = rx.wait_for(|running| !*running) => {}
        }
        self.is_running()
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}
