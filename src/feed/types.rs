//! Price feed types

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A trade tick borrowed from a raw stream frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeTick<'a> {
    /// Venue payload symbol (e.g., "BTCUSDT")
    pub symbol: &'a str,
    /// Trade price, finite and non-negative
    pub price: f64,
    /// Exchange trade time (milliseconds), when present
    pub trade_time: Option<i64>,
}

/// Price movement relative to the previously stored price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Unchanged,
}

impl Direction {
    /// Direction of `new` relative to `prev`
    pub fn between(prev: f64, new: f64) -> Self {
        if new > prev {
            Direction::Up
        } else if new < prev {
            Direction::Down
        } else {
            Direction::Unchanged
        }
    }

    /// Wire value: 1, -1 or 0
    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
            Direction::Unchanged => 0,
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.as_i8())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match i8::deserialize(deserializer)? {
            1 => Ok(Direction::Up),
            -1 => Ok(Direction::Down),
            0 => Ok(Direction::Unchanged),
            other => Err(serde::de::Error::custom(format!(
                "invalid direction {other}, expected 1, -1 or 0"
            ))),
        }
    }
}

/// An accepted price change for one tracked asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDelta {
    /// Canonical symbol (e.g., "BTC")
    pub symbol: String,
    pub price: f64,
    pub direction: Direction,
    /// Local receipt time (unix milliseconds)
    pub timestamp: i64,
}
