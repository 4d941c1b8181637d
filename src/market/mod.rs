//! Market snapshot module
//!
//! Fetches the ranked top-N asset list from a REST market-data provider and
//! indexes it by canonical and venue symbol.

mod coingecko;
mod registry;

pub use coingecko::{CoinGeckoClient, CoinGeckoConfig};
pub use registry::SymbolRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One tracked asset, as last reported by the snapshot provider.
///
/// `current_price` is the only field mutated between snapshots (by trade
/// ticks); everything else is replaced wholesale on each fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    /// Provider identifier (e.g., "bitcoin")
    pub id: String,
    /// Canonical uppercase symbol (e.g., "BTC")
    pub symbol: String,
    pub name: String,
    /// Icon URL
    pub image: String,
    pub current_price: f64,
    pub market_cap: f64,
    /// Market cap rank, 0 when the provider has none
    pub market_cap_rank: u32,
    pub total_volume: f64,
    pub price_change_percent_24h: f64,
    pub circulating_supply: f64,
    /// 7-day price samples, oldest first
    pub sparkline: Vec<f64>,
}

impl AssetRecord {
    /// Minimal record with only identity and price set
    pub fn new(symbol: impl Into<String>, current_price: f64) -> Self {
        let symbol = symbol.into().to_ascii_uppercase();
        Self {
            id: symbol.to_ascii_lowercase(),
            name: symbol.clone(),
            symbol,
            image: String::new(),
            current_price,
            market_cap: 0.0,
            market_cap_rank: 0,
            total_volume: 0.0,
            price_change_percent_24h: 0.0,
            circulating_supply: 0.0,
            sparkline: Vec::new(),
        }
    }

    /// Builder-style rank setter
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.market_cap_rank = rank;
        self
    }
}

/// Snapshot retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed snapshot payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of ranked market snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current top-N assets ordered by rank ascending.
    ///
    /// Implementations do not retry or cache; the caller owns retry policy.
    async fn fetch_snapshot(&self) -> Result<Vec<AssetRecord>, FetchError>;
}
