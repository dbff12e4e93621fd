//! Read side over the latest and history stores.

use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

use crate::constants::{CONTROL_SYMBOL, HISTORY_RESPONSE_LIMIT};
use crate::errors::{Error, Result, ValidationError};
use crate::storage::{HistoryLog, LatestStore, ObjectStore};
use quotefeed_market_data::{Snapshot, SOURCE_ALPHA_VANTAGE};

/// Read-only queries backing the HTTP API.
#[async_trait]
pub trait QueryServiceTrait: Send + Sync {
    /// Current snapshot for a ticker.
    ///
    /// Fails with a validation error when the ticker is missing or blank and
    /// with `NotFound` when nothing is stored for it.
    fn get_latest(&self, ticker: Option<&str>) -> Result<Snapshot>;

    /// Up to ten most recent history entries, newest first.
    async fn get_history(&self, ticker: Option<&str>) -> Result<Vec<Snapshot>>;
}

pub struct QueryService {
    latest: Arc<dyn LatestStore>,
    history: HistoryLog,
}

fn require_ticker(ticker: Option<&str>) -> Result<&str> {
    match ticker.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(ValidationError::MissingField("ticker".to_string()).into()),
    }
}

impl QueryService {
    pub fn new(latest: Arc<dyn LatestStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            latest,
            history: HistoryLog::new(objects),
        }
    }
}

#[async_trait]
impl QueryServiceTrait for QueryService {
    fn get_latest(&self, ticker: Option<&str>) -> Result<Snapshot> {
        let symbol = require_ticker(ticker)?;
        if symbol == CONTROL_SYMBOL {
            return Err(Error::NotFound(symbol.to_string()));
        }

        let mut snapshot = self
            .latest
            .get_latest(symbol)?
            .ok_or_else(|| Error::NotFound(symbol.to_string()))?;
        if snapshot.source.is_empty() {
            snapshot.source = SOURCE_ALPHA_VANTAGE.to_string();
        }
        Ok(snapshot)
    }

    async fn get_history(&self, ticker: Option<&str>) -> Result<Vec<Snapshot>> {
        let symbol = require_ticker(ticker)?;
        if symbol == CONTROL_SYMBOL {
            return Ok(Vec::new());
        }

        let keys = self
            .history
            .list_history_keys(symbol, HISTORY_RESPONSE_LIMIT)
            .await?;

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            match self.history.get_history_object(&key).await {
                Ok(snapshot) => entries.push(snapshot),
                Err(e) => warn!("Skipping unreadable history entry {}: {}", key, e),
            }
        }
        Ok(entries)
    }
}
