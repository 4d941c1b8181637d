//! Price feed module
//!
//! Binance combined trade stream: subscription naming, frame parsing, and the
//! streaming client that keeps one connection alive for the tracked set.

pub mod binance;
mod stream;
mod types;

pub use binance::parse_trade;
pub use stream::{ConnectionState, StreamSignal, TradeStreamClient};
pub use types::{Direction, PriceDelta, TradeTick};
