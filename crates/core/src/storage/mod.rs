//! Persistence layer.
//!
//! Two storage facets back the system:
//!
//! - [`LatestStore`] - key-value store with one current [`Snapshot`] per symbol,
//!   plus the singleton [`ControlRecord`] under [`CONTROL_SYMBOL`]
//! - [`ObjectStore`] - flat object store; [`HistoryLog`] layers the append-only
//!   per-symbol history on top of it
//!
//! ```text
//! IngestionService ──► LatestStore ◄── QueryService
//!        │                                  │
//!        └──────► HistoryLog ◄──────────────┘
//!                     │
//!                     ▼
//!                ObjectStore
//! ```
//!
//! [`Snapshot`]: quotefeed_market_data::Snapshot
//! [`CONTROL_SYMBOL`]: crate::constants::CONTROL_SYMBOL

mod history;
pub mod memory;
mod store;

pub use history::{history_key, key_timestamp, HistoryLog, HistoryWrite};
pub use store::{ControlRecord, LatestStore, ListPage, ObjectStore};
