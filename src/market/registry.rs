//! Symbol registry: the authoritative set of tracked assets
//!
//! Owns the current `AssetRecord`s and two indexes over them, one by
//! canonical symbol ("BTC") and one by venue payload symbol ("BTCUSDT").
//! Both indexes are rebuilt together from scratch on every snapshot.

use super::AssetRecord;
use crate::feed::binance;
use std::collections::{HashMap, HashSet};

/// Tracked asset set indexed for O(1) tick resolution
#[derive(Debug, Clone)]
pub struct SymbolRegistry {
    quote_asset: String,
    records: Vec<AssetRecord>,
    by_symbol: HashMap<String, usize>,
    by_stream: HashMap<String, usize>,
}

impl SymbolRegistry {
    /// Create an empty registry for streams quoted in `quote_asset`
    pub fn new(quote_asset: impl Into<String>) -> Self {
        Self {
            quote_asset: quote_asset.into().to_ascii_uppercase(),
            records: Vec::new(),
            by_symbol: HashMap::new(),
            by_stream: HashMap::new(),
        }
    }

    /// Replace the tracked set.
    ///
    /// Records keep their given order. A symbol appearing twice keeps its
    /// first (best ranked) occurrence.
    pub fn rebuild(&mut self, records: Vec<AssetRecord>) {
        self.records.clear();
        self.by_symbol.clear();
        self.by_stream.clear();

        for record in records {
            if self.by_symbol.contains_key(&record.symbol) {
                tracing::warn!(symbol = %record.symbol, "Duplicate symbol in snapshot, keeping first");
                continue;
            }
            let index = self.records.len();
            self.by_stream
                .insert(binance::stream_symbol(&record.symbol, &self.quote_asset), index);
            self.by_symbol.insert(record.symbol.clone(), index);
            self.records.push(record);
        }
    }

    /// Look up a record by venue payload symbol (e.g., "BTCUSDT")
    pub fn resolve(&self, stream_symbol: &str) -> Option<&AssetRecord> {
        self.by_stream.get(stream_symbol).map(|&i| &self.records[i])
    }

    /// Mutable variant of [`resolve`](Self::resolve), for applying ticks
    pub fn resolve_mut(&mut self, stream_symbol: &str) -> Option<&mut AssetRecord> {
        let index = *self.by_stream.get(stream_symbol)?;
        self.records.get_mut(index)
    }

    /// Look up a record by canonical symbol (e.g., "BTC")
    pub fn by_canonical_symbol(&self, symbol: &str) -> Option<&AssetRecord> {
        self.by_symbol.get(symbol).map(|&i| &self.records[i])
    }

    /// True when `next` tracks a different set of symbols than the registry
    pub fn universe_differs(&self, next: &[AssetRecord]) -> bool {
        let incoming: HashSet<&str> = next.iter().map(|r| r.symbol.as_str()).collect();

        incoming.len() != self.by_symbol.len()
            || incoming.iter().any(|symbol| !self.by_symbol.contains_key(*symbol))
    }

    /// Subscription names for every tracked asset, in rank order
    pub fn stream_names(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| binance::stream_name(&r.symbol, &self.quote_asset))
            .collect()
    }

    /// Canonical symbols in rank order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.symbol.as_str())
    }

    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    /// Detached copy of the current records for the host
    pub fn snapshot(&self) -> Vec<AssetRecord> {
        self.records.clone()
    }

    pub fn quote_asset(&self) -> &str {
        &self.quote_asset
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
