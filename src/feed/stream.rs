//! Streaming trade client: connection lifecycle and reconnect state machine
//!
//! ```text
//!   Idle --subscribe--> Connecting --Opened--> Open
//!    ^                      |                   |
//!    |                      +------Closed-------+
//!    |                      v
//!    +--teardown-- ClosedPendingReconnect --timer--> Connecting
//! ```
//!
//! At most one connection is live. Every connection gets a fresh
//! generation number and events from any other generation are dropped, so a
//! torn-down socket can never feed ticks or status into the current one.

use super::binance;
use crate::telemetry;
use crate::ws::{Backoff, ConnectionHandle, StreamConnector, StreamEvent, StreamEventKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    ClosedPendingReconnect,
}

/// What the pipeline should act on after a stream event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSignal {
    /// Connection status changed (already de-duplicated)
    Status(bool),
    /// Raw frame from the open connection
    Frame(String),
}

/// Owner of the single multiplexed trade connection
pub struct TradeStreamClient {
    connector: Arc<dyn StreamConnector>,
    base_url: String,
    events: mpsc::Sender<StreamEvent>,
    state: ConnectionState,
    handle: Option<ConnectionHandle>,
    generation: u64,
    backoff: Backoff,
    connected: bool,
    reconnect_at: Option<Instant>,
}

impl TradeStreamClient {
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        base_url: impl Into<String>,
        backoff: Backoff,
        events: mpsc::Sender<StreamEvent>,
    ) -> Self {
        Self {
            connector,
            base_url: base_url.into(),
            events,
            state: ConnectionState::Idle,
            handle: None,
            generation: 0,
            backoff,
            connected: false,
            reconnect_at: None,
        }
    }

    /// Replace the current subscription with one covering `streams`.
    ///
    /// Any live connection is closed first. An empty list only tears down.
    pub fn subscribe(&mut self, streams: &[String]) {
        self.teardown();

        if streams.is_empty() {
            tracing::debug!("No streams to subscribe, staying idle");
            return;
        }

        self.generation += 1;
        let url = binance::combined_stream_url(&self.base_url, streams);

        tracing::info!(
            generation = self.generation,
            streams = streams.len(),
            "Opening trade stream"
        );

        self.handle = Some(self.connector.open(url, self.generation, self.events.clone()));
        self.state = ConnectionState::Connecting;
    }

    /// Fire a due reconnect against the currently tracked streams
    pub fn reconnect(&mut self, streams: &[String]) {
        self.reconnect_at = None;

        if streams.is_empty() {
            tracing::debug!("Tracked set empty, skipping reconnect");
            self.state = ConnectionState::Idle;
            return;
        }

        tracing::info!(attempt = self.backoff.attempt(), "Reconnecting trade stream");
        self.subscribe(streams);
    }

    /// Close the connection and cancel any pending reconnect.
    ///
    /// Intentional; no disconnected status is reported.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(generation = handle.generation(), "Closing trade stream");
            handle.close();
        }
        self.reconnect_at = None;
        self.state = ConnectionState::Idle;
    }

    /// Advance the state machine with an event from the transport
    pub fn handle_event(&mut self, event: StreamEvent) -> Option<StreamSignal> {
        if self.handle.is_none() || event.generation != self.generation {
            tracing::trace!(
                generation = event.generation,
                current = self.generation,
                "Dropping event from stale connection"
            );
            return None;
        }

        match event.kind {
            StreamEventKind::Opened => {
                self.state = ConnectionState::Open;
                self.backoff.reset();
                tracing::info!(generation = self.generation, "Trade stream open");
                self.set_connected(true)
            }
            StreamEventKind::Frame(text) => {
                if self.state == ConnectionState::Open {
                    Some(StreamSignal::Frame(text))
                } else {
                    None
                }
            }
            StreamEventKind::Closed { reason } => {
                self.handle = None;
                self.state = ConnectionState::ClosedPendingReconnect;

                let delay = self.backoff.next_delay();
                self.reconnect_at = Some(Instant::now() + delay);
                telemetry::record_reconnect_scheduled(delay);

                tracing::warn!(
                    generation = self.generation,
                    attempt = self.backoff.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    reason = reason.as_deref().unwrap_or("closed"),
                    "Trade stream closed, reconnect scheduled"
                );
                self.set_connected(false)
            }
        }
    }

    fn set_connected(&mut self, connected: bool) -> Option<StreamSignal> {
        if self.connected == connected {
            return None;
        }
        self.connected = connected;
        telemetry::record_connection(connected);
        Some(StreamSignal::Status(connected))
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Last status reported to the host
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.backoff.attempt()
    }

    pub fn last_backoff(&self) -> Option<Duration> {
        self.backoff.last_delay()
    }
}
