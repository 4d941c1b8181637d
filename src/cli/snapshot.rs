//! Snapshot command implementation

use crate::config::Config;
use crate::market::{CoinGeckoClient, CoinGeckoConfig, SnapshotSource};
use clap::Args;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Print the raw records as JSON
    #[arg(long)]
    pub json: bool,
}

impl SnapshotArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = CoinGeckoClient::with_config(CoinGeckoConfig::from(&config.snapshot))?;
        let records = client.fetch_snapshot().await?;

        tracing::info!(assets = records.len(), "Fetched snapshot");

        if self.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
            return Ok(());
        }

        println!("{:>4}  {:<8} {:>16} {:>9}", "RANK", "SYMBOL", "PRICE", "24H %");
        for record in &records {
            println!(
                "{:>4}  {:<8} {:>16.4} {:>+8.2}%",
                record.market_cap_rank,
                record.symbol,
                record.current_price,
                record.price_change_percent_24h
            );
        }
        Ok(())
    }
}
