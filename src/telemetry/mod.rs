//! Telemetry module
//!
//! Logging, metrics, and the tick counter behind the `stats` message

mod logging;
mod metrics;
mod reporter;

pub use logging::{init_logging, LogFormat};
pub use self::metrics::{
    record_connection, record_fetch_failure, record_latency, record_reconnect_scheduled,
    record_snapshot, record_tick_accepted, record_tick_discarded, record_universe_change,
};
pub use reporter::TickCounter;

use crate::config::TelemetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Initialize all telemetry subsystems.
///
/// Must run inside a tokio runtime when a metrics port is configured.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<()> {
    init_logging(&config.log_level, config.log_format)?;

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        tracing::info!(%addr, "Prometheus metrics exporter listening");
    }

    Ok(())
}
