use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source tag written on snapshots produced by the Alpha Vantage provider.
pub const SOURCE_ALPHA_VANTAGE: &str = "alphavantage";

fn default_source() -> String {
    SOURCE_ALPHA_VANTAGE.to_string()
}

/// Convert a wall-clock instant into fractional seconds since the Unix epoch.
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0
}

/// Normalized price quote for one symbol at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ticker symbol as configured (not the provider's echo of it)
    pub symbol: String,

    /// Last traded price (required)
    pub price: Decimal,

    /// Absolute change versus previous close
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,

    /// Percent change versus previous close, as a plain number (0.51 for 0.51%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<Decimal>,

    /// Fetch time in seconds since the Unix epoch
    pub ts: f64,

    /// Provider-specific extras
    #[serde(default)]
    pub meta: Map<String, Value>,

    /// Provider tag
    #[serde(default = "default_source")]
    pub source: String,
}

impl Snapshot {
    /// Create a snapshot with only the required fields.
    pub fn new(symbol: impl Into<String>, price: Decimal, ts: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change: None,
            change_pct: None,
            ts,
            meta: Map::new(),
            source: default_source(),
        }
    }

    /// Integer-truncated timestamp used for history keys.
    pub fn ts_seconds(&self) -> i64 {
        self.ts.floor() as i64
    }
}

/// Result of asking a provider for one symbol.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    /// The provider returned a usable price.
    Quote(Snapshot),
    /// The provider answered, but without a price. Not an error.
    NoData,
}
