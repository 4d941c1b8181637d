//! CoinGecko client for ranked market snapshots
//!
//! Uses the `/coins/markets` endpoint ordered by market cap, with the 7-day
//! sparkline and 24h change included. Null or missing numeric fields are
//! normalized to zero so no "unknown price" state leaves this module.

use super::{AssetRecord, FetchError, SnapshotSource};
use crate::config::SnapshotConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Configuration for the CoinGecko client
#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Quote currency (e.g., "usd")
    pub vs_currency: String,
    /// Number of assets to request
    pub limit: usize,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        Self {
            base_url: COINGECKO_API_URL.to_string(),
            vs_currency: "usd".to_string(),
            limit: 10,
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&SnapshotConfig> for CoinGeckoConfig {
    fn from(config: &SnapshotConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            vs_currency: config.vs_currency.clone(),
            limit: config.limit,
            timeout: config.timeout(),
        }
    }
}

/// Client for CoinGecko's market endpoint
pub struct CoinGeckoClient {
    config: CoinGeckoConfig,
    client: Client,
}

impl CoinGeckoClient {
    /// Create a new client with custom configuration
    pub fn with_config(config: CoinGeckoConfig) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn markets_url(&self) -> String {
        format!("{}/coins/markets", self.config.base_url.trim_end_matches('/'))
    }

    fn query(&self) -> [(&'static str, String); 6] {
        [
            ("vs_currency", self.config.vs_currency.clone()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", self.config.limit.to_string()),
            ("page", "1".to_string()),
            ("sparkline", "true".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ]
    }
}

#[async_trait]
impl SnapshotSource for CoinGeckoClient {
    async fn fetch_snapshot(&self) -> Result<Vec<AssetRecord>, FetchError> {
        let url = self.markets_url();

        tracing::debug!(url = %url, limit = self.config.limit, "Fetching market snapshot");

        let response = self.client.get(&url).query(&self.query()).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(%status, "Market snapshot request rejected");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let records = parse_markets(&body, self.config.limit)?;

        tracing::info!(assets = records.len(), "Fetched market snapshot");

        Ok(records)
    }
}

/// One entry of the `/coins/markets` response
#[derive(Debug, Deserialize)]
struct MarketWire {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    total_volume: Option<f64>,
    #[serde(default)]
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    circulating_supply: Option<f64>,
    #[serde(default)]
    sparkline_in_7d: Option<SparklineWire>,
}

#[derive(Debug, Deserialize)]
struct SparklineWire {
    #[serde(default)]
    price: Vec<Option<f64>>,
}

impl From<MarketWire> for AssetRecord {
    fn from(wire: MarketWire) -> Self {
        Self {
            id: wire.id,
            symbol: wire.symbol.to_ascii_uppercase(),
            name: wire.name,
            image: wire.image.unwrap_or_default(),
            current_price: non_negative(wire.current_price),
            market_cap: wire.market_cap.unwrap_or_default(),
            market_cap_rank: wire.market_cap_rank.unwrap_or_default(),
            total_volume: wire.total_volume.unwrap_or_default(),
            price_change_percent_24h: wire.price_change_percentage_24h.unwrap_or_default(),
            circulating_supply: wire.circulating_supply.unwrap_or_default(),
            sparkline: wire
                .sparkline_in_7d
                .map(|s| s.price.into_iter().map(Option::unwrap_or_default).collect())
                .unwrap_or_default(),
        }
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        _ => 0.0,
    }
}

/// Decode a markets payload into rank-ordered records, at most `limit` long
fn parse_markets(body: &[u8], limit: usize) -> Result<Vec<AssetRecord>, FetchError> {
    let wire: Vec<MarketWire> = serde_json::from_slice(body)?;

    let mut records: Vec<AssetRecord> = wire.into_iter().map(AssetRecord::from).collect();

    // Unranked entries sort after ranked ones; stable sort keeps provider order otherwise
    records.sort_by_key(|r| (r.market_cap_rank == 0, r.market_cap_rank));
    records.truncate(limit);

    Ok(records)
}
