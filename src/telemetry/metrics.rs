//! Pipeline metrics
//!
//! Recorded through the `metrics` facade; they are no-ops until a recorder
//! (e.g. the Prometheus exporter) is installed.

use ::metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Assets in the most recent snapshot
pub fn record_snapshot(assets: usize) {
    counter!("cointicker_snapshots_total").increment(1);
    gauge!("cointicker_tracked_assets").set(assets as f64);
}

pub fn record_fetch_failure() {
    counter!("cointicker_snapshot_failures_total").increment(1);
}

/// Tick that produced a price delta
pub fn record_tick_accepted() {
    counter!("cointicker_ticks_accepted_total").increment(1);
}

/// Frame dropped as malformed, unknown, or a no-op price
pub fn record_tick_discarded() {
    counter!("cointicker_ticks_discarded_total").increment(1);
}

pub fn record_connection(connected: bool) {
    gauge!("cointicker_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

pub fn record_reconnect_scheduled(delay: Duration) {
    counter!("cointicker_reconnects_total").increment(1);
    histogram!("cointicker_reconnect_delay_ms").record(delay.as_millis() as f64);
}

pub fn record_universe_change() {
    counter!("cointicker_universe_changes_total").increment(1);
}

/// Round trip measured by a host
pub fn record_latency(latency_ms: i64) {
    histogram!("cointicker_host_latency_ms").record(latency_ms.max(0) as f64);
}
