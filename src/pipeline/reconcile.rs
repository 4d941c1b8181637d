//! Reconciliation rules between snapshots and live ticks

use crate::feed::Direction;
use crate::market::{AssetRecord, SymbolRegistry};

/// Why a snapshot was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Initialize,
    Refresh,
}

/// What to do with a fetched snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPlan {
    /// Initialize came back empty; try again later
    RetryInitialize,
    /// Refresh came back empty; keep serving the current set
    KeepCurrent,
    /// Replace the tracked set, re-subscribing only when asked
    Install { resubscribe: bool },
}

/// Decide how a snapshot affects the tracked set.
///
/// A refresh always reinstalls a non-empty snapshot so prices reset to the
/// provider's values, but only a change in the symbol set rewires the stream.
/// An initialize result landing after a set is already installed is handled
/// as a refresh.
pub fn plan_snapshot(
    kind: FetchKind,
    registry: &SymbolRegistry,
    records: &[AssetRecord],
) -> SnapshotPlan {
    let kind = match kind {
        FetchKind::Initialize if !registry.is_empty() => FetchKind::Refresh,
        kind => kind,
    };

    match (kind, records.is_empty()) {
        (FetchKind::Initialize, true) => SnapshotPlan::RetryInitialize,
        (FetchKind::Refresh, true) => SnapshotPlan::KeepCurrent,
        (FetchKind::Initialize, false) => SnapshotPlan::Install { resubscribe: true },
        (FetchKind::Refresh, false) => SnapshotPlan::Install {
            resubscribe: registry.universe_differs(records),
        },
    }
}

/// Apply a trade price to its record.
///
/// Returns `None` and leaves the record untouched when the price equals the
/// stored one.
pub fn apply_trade(record: &mut AssetRecord, price: f64) -> Option<Direction> {
    if price == record.current_price {
        return None;
    }
    let direction = Direction::between(record.current_price, price);
    record.current_price = price;
    Some(direction)
}
