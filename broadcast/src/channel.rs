//! Push channels delivering token rotations.
//!
//! Each scope has one named channel. Events carry `{channel, token}`.
//! [`LocalChannelHub`] fans out in-process through per-channel broadcast
//! senders; [`WsPushTransport`] feeds the same hub from a WebSocket
//! connection that speaks JSON `subscribe`/`unsubscribe` frames.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::BroadcastError;

/// A rotation event as delivered on a push channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub channel: String,
    pub token: String,
}

/// A source of per-channel rotation events.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn join(&self, channel: &str) -> Result<broadcast::Receiver<PushEvent>, BroadcastError>;

    /// Stop delivery on `channel`. Must not block; it runs on the stop path.
    fn leave(&self, channel: &str);
}

/// In-process channel fan-out.
pub struct LocalChannelHub {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<PushEvent>>>,
}

impl LocalChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<PushEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a token. Returns the number of receivers reached.
    pub fn publish(&self, channel: &str, token: impl Into<String>) -> usize {
        let sender = {
            let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            channels.get(channel).cloned()
        };
        let Some(sender) = sender else {
            return 0;
        };
        let event = PushEvent {
            channel: channel.to_string(),
            token: token.into(),
        };
        sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(channel)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    pub fn is_joined(&self, channel: &str) -> bool {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(channel)
    }
}

impl Default for LocalChannelHub {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl PushTransport for LocalChannelHub {
    async fn join(&self, channel: &str) -> Result<broadcast::Receiver<PushEvent>, BroadcastError> {
        Ok(self.sender(channel).subscribe())
    }

    fn leave(&self, channel: &str) {
        // Dropping the sender closes every receiver on the channel.
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(channel);
    }
}

/// Frames sent by the client.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ClientFrame<'a> {
    Subscribe { channel: &'a str },
    Unsubscribe { channel: &'a str },
}

/// Parse a server text frame into a rotation event. Other frames are ignored.
pub(crate) fn parse_event(text: &str) -> Option<PushEvent> {
    serde_json::from_str::<PushEvent>(text).ok()
}

/// WebSocket client transport.
pub struct WsPushTransport {
    hub: Arc<LocalChannelHub>,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsPushTransport {
    pub async fn connect(url: &str) -> Result<Self, BroadcastError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| BroadcastError::Transport(format!("connect {url}: {e}")))?;
        info!(url, "push channel connected");

        let (mut ws_sender, mut ws_receiver) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let hub = Arc::new(LocalChannelHub::default());

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = ws_sender.send(message).await {
                    warn!("push channel send error: {}", e);
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let reader_hub = Arc::clone(&hub);
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = ws_receiver.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match parse_event(&text) {
                        Some(event) => {
                            reader_hub.publish(&event.channel, event.token);
                        }
                        None => debug!("ignoring non-event frame"),
                    },
                    Ok(Message::Close(_)) => {
                        info!("push channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("push channel receive error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            hub,
            outbound,
            reader,
            writer,
        })
    }

    fn send_frame(&self, frame: &ClientFrame<'_>) -> Result<(), BroadcastError> {
        let text = serde_json::to_string(frame)
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|_| BroadcastError::Transport("push channel writer closed".into()))
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn join(&self, channel: &str) -> Result<broadcast::Receiver<PushEvent>, BroadcastError> {
        let receiver = self.hub.join(channel).await?;
        self.send_frame(&ClientFrame::Subscribe { channel })?;
        debug!(channel, "joined push channel");
        Ok(receiver)
    }

    fn leave(&self, channel: &str) {
        if let Err(e) = self.send_frame(&ClientFrame::Unsubscribe { channel }) {
            debug!(channel, "unsubscribe not sent: {}", e);
        }
        self.hub.leave(channel);
    }
}

impl Drop for WsPushTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
