//! Maps process signals onto the page lifecycle.
//!
//! A terminating daemon behaves like a closing page: SIGINT and SIGTERM are
//! both delivered as [`PageEvent::Unload`] so the broadcaster takes its
//! one-shot stop path.

use rollcall_broadcast::PageEvent;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct ShutdownController {
    tx: broadcast::Sender<PageEvent>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }

    /// Deliver `event` to every subscriber.
    pub fn shutdown(&self, event: PageEvent) {
        let _ = self.tx.send(event);
    }

    /// Wait for SIGTERM or SIGINT, then deliver `Unload`.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!(error = %e, "SIGINT handler unavailable");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { info!("received SIGINT, stopping broadcast"); }
            _ = terminate => { info!("received SIGTERM, stopping broadcast"); }
        }

        self.shutdown(PageEvent::Unload);
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
