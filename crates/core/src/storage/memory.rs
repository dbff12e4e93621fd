//! In-memory store implementations.
//!
//! Used by the service tests and the HTTP API tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::store::{ControlRecord, LatestStore, ListPage, ObjectStore};
use crate::constants::CONTROL_SYMBOL;
use crate::errors::Result;
use quotefeed_market_data::Snapshot;

#[derive(Debug, Default)]
pub struct InMemoryLatestStore {
    quotes: Mutex<HashMap<String, Snapshot>>,
    control: Mutex<Option<ControlRecord>>,
    writes: AtomicUsize,
}

impl InMemoryLatestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes, control record swaps included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Overwrites the control record unconditionally.
    pub fn set_control(&self, record: Option<ControlRecord>) {
        *self.control.lock().unwrap_or_else(|p| p.into_inner()) = record;
    }
}

#[async_trait]
impl LatestStore for InMemoryLatestStore {
    async fn put_latest(&self, snapshot: &Snapshot) -> Result<()> {
        self.quotes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(snapshot.symbol.clone(), snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_latest(&self, symbol: &str) -> Result<Option<Snapshot>> {
        if symbol == CONTROL_SYMBOL {
            return Ok(None);
        }
        Ok(self
            .quotes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(symbol)
            .cloned())
    }

    fn get_control(&self) -> Result<Option<ControlRecord>> {
        Ok(self.control.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    async fn swap_control(
        &self,
        expected: Option<&ControlRecord>,
        next: &ControlRecord,
    ) -> Result<bool> {
        let mut control = self.control.lock().unwrap_or_else(|p| p.into_inner());
        if control.as_ref() != expected {
            return Ok(false);
        }
        *control = Some(next.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores or replaces an object, bypassing the create-only rule.
    pub fn insert_raw(&self, key: &str, body: Vec<u8>) {
        self.objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), body);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_if_absent(&self, key: &str, body: Vec<u8>) -> Result<bool> {
        let mut objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        if objects.contains_key(key) {
            return Ok(false);
        }
        objects.insert(key.to_string(), body);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned())
    }

    async fn list(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let objects = self.objects.lock().unwrap_or_else(|p| p.into_inner());
        let lower = match start_after {
            Some(after) if after >= prefix => Bound::Excluded(after.to_string()),
            _ => Bound::Included(prefix.to_string()),
        };

        let mut matching = objects
            .range::<String, _>((lower, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(max_keys).cloned().collect();
        let is_truncated = matching.next().is_some();
        Ok(ListPage { keys, is_truncated })
    }
}
