//! Database model for the latest-quote table.

use diesel::prelude::*;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::errors::StorageError;
use quotefeed_core::constants::{CONTROL_SOURCE, CONTROL_SYMBOL};
use quotefeed_core::storage::ControlRecord;
use quotefeed_market_data::Snapshot;

/// One row per symbol. Numbers are kept as text so decimals survive exactly.
#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::latest_quotes)]
#[diesel(primary_key(symbol))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LatestQuoteDB {
    pub symbol: String,
    /// NULL only on the control row
    pub price: Option<String>,
    pub ts: String,
    pub change: Option<String>,
    pub change_pct: Option<String>,
    pub meta: String,
    pub source: String,
}

fn parse_decimal(column: &str, text: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| StorageError::CorruptRow(format!("{} {:?}: {}", column, text, e)))
}

pub(crate) fn parse_ts(text: &str) -> Result<f64, StorageError> {
    f64::from_str(text).map_err(|e| StorageError::CorruptRow(format!("ts {:?}: {}", text, e)))
}

impl LatestQuoteDB {
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, StorageError> {
        Ok(Self {
            symbol: snapshot.symbol.clone(),
            price: Some(snapshot.price.to_string()),
            ts: snapshot.ts.to_string(),
            change: snapshot.change.map(|d| d.to_string()),
            change_pct: snapshot.change_pct.map(|d| d.to_string()),
            meta: serde_json::to_string(&snapshot.meta)?,
            source: snapshot.source.clone(),
        })
    }

    pub fn control(record: &ControlRecord) -> Self {
        Self {
            symbol: CONTROL_SYMBOL.to_string(),
            price: None,
            ts: record.ts.to_string(),
            change: None,
            change_pct: None,
            meta: "{}".to_string(),
            source: CONTROL_SOURCE.to_string(),
        }
    }

    pub fn into_snapshot(self) -> Result<Snapshot, StorageError> {
        let price = match self.price.as_deref() {
            Some(text) => parse_decimal("price", text)?,
            None => {
                return Err(StorageError::CorruptRow(format!(
                    "row {} has no price",
                    self.symbol
                )))
            }
        };
        let meta: Map<String, Value> = if self.meta.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&self.meta)?
        };

        Ok(Snapshot {
            price,
            ts: parse_ts(&self.ts)?,
            change: self
                .change
                .as_deref()
                .map(|t| parse_decimal("change", t))
                .transpose()?,
            change_pct: self
                .change_pct
                .as_deref()
                .map(|t| parse_decimal("change_pct", t))
                .transpose()?,
            meta,
            source: self.source,
            symbol: self.symbol,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_snapshot_row_keeps_exact_decimals() {
        let mut snapshot = Snapshot::new("AAPL", dec!(123.4500), 1_700_000_000.125);
        snapshot.change = Some(dec!(-1.2));
        snapshot.change_pct = Some(dec!(-0.96));
        snapshot
            .meta
            .insert("volume".to_string(), json!("51234567"));

        let row = LatestQuoteDB::from_snapshot(&snapshot).unwrap();
        assert_eq!(row.price.as_deref(), Some("123.4500"));
        assert_eq!(row.change_pct.as_deref(), Some("-0.96"));

        let back = row.into_snapshot().unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_control_row_is_not_a_snapshot() {
        let row = LatestQuoteDB::control(&ControlRecord::new(42.5));
        assert_eq!(row.symbol, CONTROL_SYMBOL);
        assert_eq!(row.source, "system");
        assert!(matches!(row.into_snapshot(), Err(StorageError::CorruptRow(_))));
    }

    #[test]
    fn test_garbage_numbers_are_corrupt_rows() {
        let mut row = LatestQuoteDB::from_snapshot(&Snapshot::new("X", dec!(1), 1.0)).unwrap();
        row.price = Some("abc".to_string());
        assert!(matches!(row.into_snapshot(), Err(StorageError::CorruptRow(_))));
    }
}
