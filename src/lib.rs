//! coin-ticker: live prices for the top-ranked crypto assets
//!
//! This library provides the core components for:
//! - Ranked market snapshots from CoinGecko
//! - A symbol registry mapping venue tick symbols to tracked assets
//! - A Binance combined trade stream with reconnect backoff
//! - Reconciliation of snapshots with live ticks
//! - Throughput and latency telemetry
//! - The message protocol spoken with the host

pub mod boundary;
pub mod cli;
pub mod config;
pub mod feed;
pub mod market;
pub mod pipeline;
pub mod telemetry;
pub mod ws;
