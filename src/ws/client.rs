//! WebSocket transport built on tokio-tungstenite

use super::types::{ConnectionHandle, StreamConnector, StreamEvent, StreamEventKind, WsConfig, WsError};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// How a connection task ended
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    /// The handle asked for the close
    Requested,
    /// Peer sent a close frame
    PeerClosed,
    /// Pipeline stopped listening
    ReceiverDropped,
}

/// Production connector: one tokio task per connection
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector {
    config: WsConfig,
}

impl TungsteniteConnector {
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Drive one connection until it closes, then report why
    async fn run(
        config: WsConfig,
        url: String,
        generation: u64,
        events: mpsc::Sender<StreamEvent>,
        close_rx: oneshot::Receiver<()>,
    ) {
        let reason = match Self::connect_and_stream(&config, &url, generation, &events, close_rx).await {
            Ok(Exit::Requested) => {
                tracing::debug!(generation, "WebSocket closed on request");
                return;
            }
            Ok(Exit::ReceiverDropped) => return,
            Ok(Exit::PeerClosed) => {
                tracing::info!(generation, "WebSocket closed by peer");
                None
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "WebSocket connection failed");
                Some(e.to_string())
            }
        };

        let _ = events
            .send(StreamEvent::new(generation, StreamEventKind::Closed { reason }))
            .await;
    }

    /// Connect to WebSocket and stream messages
    async fn connect_and_stream(
        config: &WsConfig,
        url: &str,
        generation: u64,
        events: &mpsc::Sender<StreamEvent>,
        mut close_rx: oneshot::Receiver<()>,
    ) -> Result<Exit, WsError> {
        tracing::info!(generation, url = %url, "Connecting to WebSocket");

        let ws_stream = tokio::select! {
            biased;
            _ = &mut close_rx => return Ok(Exit::Requested),
            result = connect_async(url) => {
                let (stream, _response) = result.map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
                stream
            }
        };

        let (mut write, mut read) = ws_stream.split();

        tracing::info!(generation, "WebSocket connected");

        if events
            .send(StreamEvent::new(generation, StreamEventKind::Opened))
            .await
            .is_err()
        {
            return Ok(Exit::ReceiverDropped);
        }

        // First tick fires a full interval after connect
        let period = config.ping_interval.max(std::time::Duration::from_millis(1));
        let mut ping_interval =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut pong_deadline: Option<tokio::time::Instant> = None;

        loop {
            tokio::select! {
                biased;

                _ = &mut close_rx => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(Exit::Requested);
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if events
                                .send(StreamEvent::new(generation, StreamEventKind::Frame(text)))
                                .await
                                .is_err()
                            {
                                return Ok(Exit::ReceiverDropped);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            pong_deadline = None;
                        }
                        Some(Ok(Message::Close(_))) => {
                            return Ok(Exit::PeerClosed);
                        }
                        Some(Ok(_)) => {
                            // Trade streams never carry binary payloads
                        }
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::StreamEnded);
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    write.send(Message::Ping(Vec::new())).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    if pong_deadline.is_none() {
                        pong_deadline = Some(tokio::time::Instant::now() + config.pong_timeout);
                    }
                }

                _ = sleep_until_opt(pong_deadline) => {
                    return Err(WsError::PongTimeout);
                }
            }
        }
    }
}

impl StreamConnector for TungsteniteConnector {
    fn open(
        &self,
        url: String,
        generation: u64,
        events: mpsc::Sender<StreamEvent>,
    ) -> ConnectionHandle {
        let (close_tx, close_rx) = oneshot::channel();
        let config = self.config.clone();

        tokio::spawn(Self::run(config, url, generation, events, close_rx));

        ConnectionHandle::new(generation, close_tx)
    }
}

/// Sleep until `deadline`, or forever when there is none
pub(crate) async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
