//! Quote provider trait definition.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::FetchOutcome;

use super::capabilities::RateLimit;

/// Trait for quote providers.
///
/// Implementations fetch one symbol per call and normalize the response into a
/// [`Snapshot`](crate::Snapshot). A response without a price is reported as
/// [`FetchOutcome::NoData`], not as an error, so callers can skip the symbol and
/// keep going.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider, e.g. "ALPHA_VANTAGE".
    ///
    /// Used for logging and error attribution.
    fn id(&self) -> &'static str;

    /// Rate limiting configuration.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Fetch the current quote for a single symbol.
    ///
    /// # Errors
    ///
    /// - [`MarketDataError::Upstream`], [`MarketDataError::Timeout`] or
    ///   [`MarketDataError::RateLimited`] when the call itself fails
    /// - [`MarketDataError::Parse`] when the payload has an unexpected shape
    async fn fetch_quote(&self, symbol: &str) -> Result<FetchOutcome, MarketDataError>;
}
