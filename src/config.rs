//! Configuration types for coin-ticker

use crate::feed::binance::BINANCE_WS_URL;
use crate::telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Floor for every timer period; tokio intervals reject zero
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Market snapshot (REST) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotConfig {
    /// Market-data API base URL
    #[serde(default = "default_snapshot_url")]
    pub base_url: String,
    /// Quote currency for prices and market caps
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    /// Number of top-ranked assets to track
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_snapshot_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}
fn default_vs_currency() -> String {
    "usd".to_string()
}
fn default_limit() -> usize {
    10
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            base_url: default_snapshot_url(),
            vs_currency: default_vs_currency(),
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SnapshotConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Trade stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Trade stream base URL (combined streams live under `/stream`)
    #[serde(default = "default_stream_url")]
    pub base_url: String,
    /// Quote asset appended to each canonical symbol (BTC -> BTCUSDT)
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    /// Backoff base delay in milliseconds
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    /// Backoff cap in milliseconds
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Interval between keepalive ping frames
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Time allowed for a pong before the connection is considered dead
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
    /// Capacity of the transport -> pipeline event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_stream_url() -> String {
    BINANCE_WS_URL.to_string()
}
fn default_quote_asset() -> String {
    "USDT".to_string()
}
fn default_reconnect_base_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_keepalive_secs() -> u64 {
    30
}
fn default_pong_timeout_secs() -> u64 {
    10
}
fn default_event_buffer() -> usize {
    1024
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_stream_url(),
            quote_asset: default_quote_asset(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            keepalive_secs: default_keepalive_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl StreamConfig {
    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs).max(MIN_PERIOD)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

/// Reconciliation engine timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Periodic snapshot refresh
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Delay before retrying an initialize that produced no data
    #[serde(default = "default_init_retry_secs")]
    pub init_retry_secs: u64,
    /// Telemetry window for the updates counter
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

fn default_refresh_interval_secs() -> u64 {
    300
}
fn default_init_retry_secs() -> u64 {
    10
}
fn default_stats_interval_ms() -> u64 {
    1_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            init_retry_secs: default_init_retry_secs(),
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs).max(MIN_PERIOD)
    }

    pub fn init_retry(&self) -> Duration {
        Duration::from_secs(self.init_retry_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms).max(MIN_PERIOD)
    }
}

/// Settings used by the bundled CLI host
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// How often the host sends a latency probe
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

fn default_ping_interval_secs() -> u64 {
    5
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

impl HostConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs).max(MIN_PERIOD)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus scrape port; metrics stay in-process when unset
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would leave a periodic timer with no period
    pub fn validate(&self) -> anyhow::Result<()> {
        let periods = [
            ("stream.keepalive_secs", self.stream.keepalive_secs),
            ("pipeline.refresh_interval_secs", self.pipeline.refresh_interval_secs),
            ("pipeline.stats_interval_ms", self.pipeline.stats_interval_ms),
            ("host.ping_interval_secs", self.host.ping_interval_secs),
        ];
        for (name, value) in periods {
            if value == 0 {
                anyhow::bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }
}
