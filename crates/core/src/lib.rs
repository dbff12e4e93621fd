//! Quotefeed Core - ingestion and read services.
//!
//! This crate holds the batch ingestion loop, the read-side queries and the
//! storage traits they run against. It is storage-agnostic: the traits in
//! [`storage`] are implemented by `storage-sqlite`, `storage-fs` and the
//! in-memory fakes in [`storage::memory`].

pub mod clock;
pub mod constants;
pub mod errors;
pub mod ingest;
pub mod query;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ingest::{BatchReport, IngestSettings, IngestionService, IngestionServiceTrait};
pub use query::{QueryService, QueryServiceTrait};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
