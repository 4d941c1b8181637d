//! Binance combined trade stream: naming and frame parsing

use super::TradeTick;
use serde::Deserialize;
use std::borrow::Cow;

/// Binance WebSocket base URL
pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443";

/// Combined stream envelope: `{"stream": "btcusdt@trade", "data": {...}}`
#[derive(Debug, Deserialize)]
struct CombinedFrame<'a> {
    #[serde(borrow)]
    data: Option<TradeMessage<'a>>,
}

/// Binance trade message structure
#[derive(Debug, Deserialize)]
struct TradeMessage<'a> {
    /// Event type
    #[serde(rename = "e", borrow)]
    event_type: Cow<'a, str>,
    /// Symbol
    #[serde(rename = "s", borrow)]
    symbol: Cow<'a, str>,
    /// Price
    #[serde(rename = "p", borrow)]
    price: Cow<'a, str>,
    /// Trade time (milliseconds)
    #[serde(rename = "T", default)]
    trade_time: Option<i64>,
}

/// Venue payload symbol for a canonical symbol: ("btc", "usdt") -> "BTCUSDT"
pub fn stream_symbol(symbol: &str, quote_asset: &str) -> String {
    let mut out = String::with_capacity(symbol.len() + quote_asset.len());
    out.push_str(symbol);
    out.push_str(quote_asset);
    out.make_ascii_uppercase();
    out
}

/// Subscription stream name: ("BTC", "USDT") -> "btcusdt@trade"
pub fn stream_name(symbol: &str, quote_asset: &str) -> String {
    let mut out = stream_symbol(symbol, quote_asset);
    out.make_ascii_lowercase();
    out.push_str("@trade");
    out
}

/// URL of one multiplexed connection covering every stream in `names`
pub fn combined_stream_url(base_url: &str, names: &[String]) -> String {
    format!("{}/stream?streams={}", base_url.trim_end_matches('/'), names.join("/"))
}

/// Parse a combined-stream frame into a trade tick.
///
/// Returns `None` for anything that is not a well-formed trade with a
/// finite, non-negative price. The tick borrows its symbol from `frame`
/// whenever the payload has no escapes, which is always the case for
/// Binance symbols.
pub fn parse_trade(frame: &str) -> Option<TradeTick<'_>> {
    let envelope: CombinedFrame<'_> = serde_json::from_str(frame).ok()?;
    let trade = envelope.data?;

    if trade.event_type != "trade" {
        return None;
    }

    let price: f64 = trade.price.parse().ok()?;
    if !price.is_finite() || price < 0.0 {
        return None;
    }

    let symbol = match trade.symbol {
        Cow::Borrowed(s) => s,
        // Escaped symbol text never matches a registry key
        Cow::Owned(_) => return None,
    };

    Some(TradeTick {
        symbol,
        price,
        trade_time: trade.trade_time,
    })
}
