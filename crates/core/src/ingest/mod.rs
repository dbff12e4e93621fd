//! Quote ingestion.
//!
//! - [`model`] - Batch settings, per-symbol outcomes and the batch report
//! - [`service`] - The cooldown-gated batch loop
//!
//! ```text
//! run_batch
//!   ├─ no provider ─────────────► config-missing per symbol
//!   ├─ cooldown active ─────────► skipped
//!   ├─ claim control record (CAS)
//!   │     └─ lost ──────────────► skipped (in progress)
//!   ├─ for each symbol: fetch → put_latest → put_history, pacing between
//!   └─ re-arm control record
//! ```

pub mod model;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use model::{
    parse_symbols, BatchReport, FailureKind, IngestSettings, SkipReason, SymbolOutcome,
    REASON_CONFIG_MISSING, REASON_NO_DATA,
};
pub use service::{IngestionService, IngestionServiceTrait};
