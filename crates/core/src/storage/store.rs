//! Storage traits.
//!
//! These traits abstract the external storage services so the ingestion and
//! query services can run against SQLite, the filesystem, or in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::HISTORY_LIST_PAGE_SIZE;
use crate::errors::Result;
use quotefeed_market_data::Snapshot;

/// Timestamp of the last ingestion batch, stored under the sentinel key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlRecord {
    /// Seconds since the Unix epoch
    pub ts: f64,
}

impl ControlRecord {
    pub fn new(ts: f64) -> Self {
        Self { ts }
    }
}

/// Storage interface for the latest snapshot per symbol.
///
/// - Writes are async; implementations may funnel them through a writer task
/// - Reads are sync point lookups
/// - `get_latest` never returns the control record
#[async_trait]
pub trait LatestStore: Send + Sync {
    /// Upserts the snapshot keyed by its symbol. Full overwrite, no field merge.
    async fn put_latest(&self, snapshot: &Snapshot) -> Result<()>;

    /// Gets the current snapshot for a symbol.
    fn get_latest(&self, symbol: &str) -> Result<Option<Snapshot>>;

    /// Reads the control record, if one was ever written.
    fn get_control(&self) -> Result<Option<ControlRecord>>;

    /// Writes `next` only if the stored control record still equals `expected`
    /// (`None` meaning "no record yet").
    ///
    /// # Returns
    ///
    /// `true` if the write happened, `false` if another writer got there first.
    async fn swap_control(
        &self,
        expected: Option<&ControlRecord>,
        next: &ControlRecord,
    ) -> Result<bool>;
}

/// One page of an object listing, in ascending key order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// More keys exist after the last one in `keys`.
    pub is_truncated: bool,
}

/// Storage interface for immutable objects addressed by string keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `key` unless the key already exists.
    ///
    /// # Returns
    ///
    /// `true` if the object was created, `false` if the key was taken.
    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<bool>;

    /// Reads an object, `None` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Lists keys starting with `prefix` that sort strictly after `start_after`,
    /// at most `max_keys` of them.
    async fn list(&self, prefix: &str, start_after: Option<&str>, max_keys: usize)
        -> Result<ListPage>;

    /// Every key starting with `prefix`, in ascending order.
    ///
    /// Pages through [`ObjectStore::list`] by default. Stores that can enumerate
    /// a prefix in one pass should override this.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        loop {
            let page = self
                .list(prefix, keys.last().map(String::as_str), HISTORY_LIST_PAGE_SIZE)
                .await?;
            let done = !page.is_truncated || page.keys.is_empty();
            keys.extend(page.keys);
            if done {
                return Ok(keys);
            }
        }
    }
}
