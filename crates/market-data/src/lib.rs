//! Quotefeed Market Data Crate
//!
//! This crate fetches single-symbol price quotes from an external provider and
//! normalizes them into canonical [`Snapshot`] records.
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+     +------------------+
//! |  Ingestion loop  | --> |  QuoteProvider   | --> |   FetchOutcome   |
//! +------------------+     +------------------+     +------------------+
//!                                  |                    Quote(Snapshot)
//!                                  v                    NoData
//!                          +------------------+
//!                          | Alpha Vantage    |  (GLOBAL_QUOTE endpoint)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Snapshot`] - Normalized quote for one symbol at one point in time
//! - [`FetchOutcome`] - Either a snapshot or a "no usable price" marker
//! - [`QuoteProvider`] - Trait implemented by every quote source
//! - [`MarketDataError`] - Upstream and parse failures

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::MarketDataError;
pub use models::{
    epoch_seconds, parse_decimal, parse_percent, FetchOutcome, Snapshot, SOURCE_ALPHA_VANTAGE,
};
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::{QuoteProvider, RateLimit};
