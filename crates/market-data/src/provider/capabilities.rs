//! Provider rate limiting hints.

use std::time::Duration;

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Minimum delay between requests.
    pub min_delay: Duration,
}

impl RateLimit {
    /// Returns true when `pacing` leaves at least `min_delay` between calls.
    pub fn is_respected_by(&self, pacing: Duration) -> bool {
        pacing >= self.min_delay
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            min_delay: Duration::from_secs(1),
        }
    }
}
