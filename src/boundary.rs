//! Messages exchanged between the pipeline and its host
//!
//! Both directions are tagged by a `type` field on the wire, e.g.
//! `{"type":"price","update":{...}}` and `{"type":"refresh"}`.

use crate::feed::PriceDelta;
use crate::market::AssetRecord;
use serde::{Deserialize, Serialize};

/// Host -> pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HostCommand {
    /// Latency probe; answered with [`PipelineMessage::Pong`]
    Ping,
    /// Out-of-cycle snapshot refresh
    Refresh,
}

/// Pipeline -> host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PipelineMessage {
    /// Full tracked set, rank ordered
    Coins { coins: Vec<AssetRecord> },
    /// One accepted price change
    Price { update: PriceDelta },
    /// Ticks accepted during the last telemetry window
    Stats { updates: u64 },
    /// Stream connection up/down, de-duplicated
    Status { connected: bool },
    /// Recoverable failure notice
    Error { message: String },
    /// Reply to a ping, carrying the pipeline's clock (unix ms)
    Pong { timestamp: i64 },
}

/// Measures ping round trips from the host side
#[derive(Debug, Default, Clone)]
pub struct LatencyProbe {
    sent_at_ms: Option<i64>,
}

impl LatencyProbe {
    /// Remember when the latest ping left
    pub fn mark_sent(&mut self, now_ms: i64) {
        self.sent_at_ms = Some(now_ms);
    }

    /// Round trip for a pong received at `now_ms`, if a ping is outstanding
    pub fn on_pong(&mut self, now_ms: i64) -> Option<i64> {
        self.sent_at_ms.map(|sent| (now_ms - sent).max(0))
    }
}

/// Dashboard view of pipeline health, derived from boundary messages
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostStats {
    pub updates_per_second: u64,
    pub is_connected: bool,
    pub latency_ms: i64,
}

impl HostStats {
    /// Fold one message into the stats.
    ///
    /// Returns the connection transition when `status` flips the state.
    pub fn apply(
        &mut self,
        message: &PipelineMessage,
        probe: &mut LatencyProbe,
        now_ms: i64,
    ) -> Option<bool> {
        match message {
            PipelineMessage::Stats { updates } => {
                self.updates_per_second = *updates;
                None
            }
            PipelineMessage::Status { connected } => {
                let changed = self.is_connected != *connected;
                self.is_connected = *connected;
                changed.then_some(*connected)
            }
            PipelineMessage::Pong { .. } => {
                if let Some(latency) = probe.on_pong(now_ms) {
                    self.latency_ms = latency;
                }
                None
            }
            PipelineMessage::Coins { .. }
            | PipelineMessage::Price { .. }
            | PipelineMessage::Error { .. } => None,
        }
    }
}
