//! Market data models
//!
//! - `snapshot` - The canonical quote record and the fetch outcome
//! - `numeric` - Lenient parsing of provider-encoded numbers

mod numeric;
mod snapshot;

pub use numeric::{parse_decimal, parse_percent};
pub use snapshot::{epoch_seconds, FetchOutcome, Snapshot, SOURCE_ALPHA_VANTAGE};
