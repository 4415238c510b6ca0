//! Price bar (OHLCV) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV price observation for one ticker over one time interval.
///
/// Identity is the composite of ticker identifier and bar timestamp so that
/// re-fetching the same range is an idempotent upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    /// Composite identity: `{ticker_id}-{bar_timestamp_ms}`
    pub stock_id: String,
    pub ticker_id: String,
    pub open_price: f64,
    pub close_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub trading_volume: f64,
    /// Time of the bar itself
    pub stocked_at: DateTime<Utc>,
    /// When this record was created locally
    pub created_at: DateTime<Utc>,
}

impl Stock {
    /// Compose the natural key for a bar from its ticker and timestamp.
    pub fn compose_id(ticker_id: &str, bar_timestamp_ms: i64) -> String {
        const SEP: &str = "-";
        format!("{}{}{}", ticker_id, SEP, bar_timestamp_ms)
    }
}
