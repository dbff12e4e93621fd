//! Append-only snapshot history on top of an [`ObjectStore`].
//!
//! Objects are keyed `"{symbol}/{integer-epoch-seconds}.json"`. Listing order from
//! the object store is lexicographic, which only matches chronological order while
//! all timestamps have the same number of digits, so keys are re-sorted by their
//! parsed timestamp before truncation.

use log::{debug, warn};
use std::cmp::Ordering;
use std::sync::Arc;

use super::store::ObjectStore;
use crate::errors::{Error, Result};
use quotefeed_market_data::Snapshot;

/// Object key for a snapshot of `symbol` taken at `ts_seconds`.
pub fn history_key(symbol: &str, ts_seconds: i64) -> String {
    format!("{}/{}.json", symbol, ts_seconds)
}

/// Timestamp encoded in a history key, if the key follows the layout.
pub fn key_timestamp(key: &str) -> Option<i64> {
    key.rsplit('/').next()?.strip_suffix(".json")?.parse().ok()
}

/// Most recent first. Keys that do not parse sort after all parseable ones.
fn newest_first(a: &String, b: &String) -> Ordering {
    match (key_timestamp(a), key_timestamp(b)) {
        (Some(ta), Some(tb)) => tb.cmp(&ta).then_with(|| b.cmp(a)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}

/// What happened to a history write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryWrite {
    Created(String),
    /// An entry for the same symbol and second already existed and was kept.
    AlreadyExists(String),
}

#[derive(Clone)]
pub struct HistoryLog {
    store: Arc<dyn ObjectStore>,
}

impl HistoryLog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Appends a snapshot. Existing entries are never overwritten.
    pub async fn put_history(&self, snapshot: &Snapshot) -> Result<HistoryWrite> {
        let key = history_key(&snapshot.symbol, snapshot.ts_seconds());
        let body = serde_json::to_vec(snapshot)?;

        if self.store.put_if_absent(&key, body).await? {
            debug!("History entry written: {}", key);
            Ok(HistoryWrite::Created(key))
        } else {
            warn!("History entry {} already exists, keeping the original", key);
            Ok(HistoryWrite::AlreadyExists(key))
        }
    }

    /// Keys of the `limit` most recent entries for `symbol`, newest first.
    pub async fn list_history_keys(&self, symbol: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut keys = self.store.list_prefix(&format!("{}/", symbol)).await?;
        keys.sort_by(newest_first);
        keys.truncate(limit);
        Ok(keys)
    }

    /// Reads and parses one history entry.
    pub async fn get_history_object(&self, key: &str) -> Result<Snapshot> {
        let body = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("history object {}", key)))?;
        Ok(serde_json::from_slice(&body)?)
    }
}
