//! Error types for the market data crate.

use thiserror::Error;

/// Errors that can occur while fetching a quote from a provider.
///
/// A missing price is not an error: providers report it as
/// [`FetchOutcome::NoData`](crate::FetchOutcome::NoData).
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider answered with a non-success status or the transport failed.
    #[error("Upstream error: {provider} - {message}")]
    Upstream {
        /// The provider that failed
        provider: String,
        /// Transport or status detail
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The payload could not be interpreted as a quote response.
    #[error("Parse error: {provider} - {message}")]
    Parse {
        /// The provider whose payload was malformed
        provider: String,
        /// What was wrong with the payload
        message: String,
    },

    /// The symbol cannot be sent to the provider (empty or blank).
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),
}

impl MarketDataError {
    /// Returns true for failures of the call itself (transport, status, timeout, throttling).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }

    /// Returns true when the provider answered but the payload was malformed.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
