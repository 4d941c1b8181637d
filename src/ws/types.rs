//! WebSocket types and configuration

use crate::config::StreamConfig;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Interval for sending keepalive ping frames
    pub ping_interval: Duration,
    /// Timeout for pong response
    pub pong_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl WsConfig {
    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d.max(Duration::from_millis(1));
        self
    }

    /// Set pong timeout
    pub fn pong_timeout(mut self, d: Duration) -> Self {
        self.pong_timeout = d;
        self
    }
}

impl From<&StreamConfig> for WsConfig {
    fn from(config: &StreamConfig) -> Self {
        Self::default()
            .ping_interval(config.keepalive())
            .pong_timeout(config.pong_timeout())
    }
}

/// Event reported by a connection task, tagged with the connection's generation
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub generation: u64,
    pub kind: StreamEventKind,
}

impl StreamEvent {
    pub fn new(generation: u64, kind: StreamEventKind) -> Self {
        Self { generation, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventKind {
    /// Handshake completed
    Opened,
    /// Text frame received
    Frame(String),
    /// Connection ended without being asked to (peer close, error, timeout)
    Closed { reason: Option<String> },
}

/// Owner of one live connection.
///
/// Closing or dropping the handle shuts the connection down; the task then
/// exits without reporting `Closed`.
#[derive(Debug)]
pub struct ConnectionHandle {
    generation: u64,
    close_tx: Option<oneshot::Sender<()>>,
}

impl ConnectionHandle {
    pub fn new(generation: u64, close_tx: oneshot::Sender<()>) -> Self {
        Self {
            generation,
            close_tx: Some(close_tx),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Request an orderly close
    pub fn close(mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Opens streaming connections on behalf of the streaming client
pub trait StreamConnector: Send + Sync {
    /// Start connecting to `url`.
    ///
    /// Every event for this connection must carry `generation` and be sent on
    /// `events`. Returns immediately; the handshake happens in the background.
    fn open(
        &self,
        url: String,
        generation: u64,
        events: mpsc::Sender<StreamEvent>,
    ) -> ConnectionHandle;
}

/// WebSocket errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum WsError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// Keepalive ping went unanswered
    #[error("Pong timeout")]
    PongTimeout,
    /// Server ended the stream
    #[error("Stream ended unexpectedly")]
    StreamEnded,
}
