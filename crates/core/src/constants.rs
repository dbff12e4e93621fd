use std::time::Duration;

/// Reserved latest-store key holding the cooldown control record.
/// Never accepted as a ticker symbol.
pub const CONTROL_SYMBOL: &str = "__CONTROL__";

/// Source tag written on the control record row.
pub const CONTROL_SOURCE: &str = "system";

/// Page size used when listing history keys from the object store
pub const HISTORY_LIST_PAGE_SIZE: usize = 50;

/// Number of entries returned by the history query
pub const HISTORY_RESPONSE_LIMIT: usize = 10;

/// Default delay between provider calls within one batch
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Default minimum interval between batches (10 hours)
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10 * 60 * 60);

/// Tickers ingested when none are configured
pub const DEFAULT_TICKERS: &str = "NVDA,MSFT,AAPL,AMZN,META,AVGO,GOOGL,GOOG,TSLA,BRK.B";
