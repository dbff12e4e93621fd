//! SQLite storage implementation for Quotefeed.
//!
//! This crate is the only place where Diesel dependencies exist. It implements
//! the [`LatestStore`](quotefeed_core::storage::LatestStore) trait from
//! `quotefeed-core` and contains:
//! - Database initialization, connection pooling and embedded migrations
//! - The single writer actor that serializes all writes
//! - The `latest_quotes` repository, including the control record swap
//!
//! ```text
//!    core (LatestStore)
//!          │
//!          ▼
//!  storage-sqlite (this crate) ── WriteHandle ──► writer task
//!          │                                         │
//!          └──────────────── SQLite (WAL) ◄──────────┘
//! ```

pub mod db;
pub mod errors;
pub mod latest;
pub mod schema;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

pub use latest::LatestQuoteRepository;

// Re-export from quotefeed-core for convenience
pub use quotefeed_core::errors::{DatabaseError, Error, Result};
