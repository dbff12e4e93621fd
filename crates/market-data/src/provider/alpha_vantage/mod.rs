//! Alpha Vantage quote provider implementation.
//!
//! Fetches the current quote for one symbol via the GLOBAL_QUOTE endpoint.
//! Numeric fields arrive as strings and the percent change carries a trailing `%`.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{
    epoch_seconds, parse_decimal, parse_percent, FetchOutcome, Snapshot, SOURCE_ALPHA_VANTAGE,
};
use crate::provider::{QuoteProvider, RateLimit};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Alpha Vantage quote provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Quote section. Fields are kept as raw JSON values so a number where a
/// string was expected degrades to "absent" instead of failing the whole payload.
#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<Value>,
    #[serde(rename = "02. open")]
    open: Option<Value>,
    #[serde(rename = "03. high")]
    high: Option<Value>,
    #[serde(rename = "04. low")]
    low: Option<Value>,
    #[serde(rename = "05. price")]
    price: Option<Value>,
    #[serde(rename = "06. volume")]
    volume: Option<Value>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<Value>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<Value>,
    #[serde(rename = "09. change")]
    change: Option<Value>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<Value>,
}

impl GlobalQuote {
    /// Provider-specific extras carried in `Snapshot::meta`.
    fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert(
            "provider_symbol".to_string(),
            self.symbol.clone().unwrap_or(Value::Null),
        );
        let extras = [
            ("latest_trading_day", &self.latest_trading_day),
            ("previous_close", &self.previous_close),
            ("open", &self.open),
            ("high", &self.high),
            ("low", &self.low),
            ("volume", &self.volume),
        ];
        for (key, value) in extras {
            if let Some(value) = value.as_ref().filter(|v| !v.is_null()) {
                meta.insert(key.to_string(), value.clone());
            }
        }
        meta
    }
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the given API key and the default timeout.
    pub fn new(api_key: String) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a provider whose HTTP calls give up after `timeout`.
    pub fn with_timeout(api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the provider at a different endpoint (used by tests and proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params).map_err(|e| {
            MarketDataError::Upstream {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!("Alpha Vantage request: {}", self.redact(url.as_str()));

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Upstream {
                    provider: PROVIDER_ID.to_string(),
                    message: self.redact(&e.to_string()),
                }
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::Upstream {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Upstream {
                    provider: PROVIDER_ID.to_string(),
                    message: self.redact(&e.to_string()),
                }
            }
        })
    }

    fn redact(&self, text: &str) -> String {
        if self.api_key.is_empty() {
            return text.to_string();
        }
        text.replace(&self.api_key, "***")
    }

    fn parse_response(text: &str) -> Result<GlobalQuoteResponse, MarketDataError> {
        let parse_error = |message: String| MarketDataError::Parse {
            provider: PROVIDER_ID.to_string(),
            message,
        };

        let value: Value = serde_json::from_str(text)
            .map_err(|e| parse_error(format!("Failed to parse response: {}", e)))?;
        if !value.is_object() {
            return Err(parse_error("Response is not a JSON object".to_string()));
        }
        serde_json::from_value(value)
            .map_err(|e| parse_error(format!("Unexpected response shape: {}", e)))
    }

    /// Surface provider notices. They never carry a price, so the caller sees `NoData`.
    fn log_api_messages(symbol: &str, response: &GlobalQuoteResponse) {
        if let Some(ref msg) = response.error_message {
            warn!("Alpha Vantage error for {}: {}", symbol, msg);
        }
        if let Some(ref msg) = response.note {
            warn!("Alpha Vantage note for {}: {}", symbol, msg);
        }
        if let Some(ref msg) = response.information {
            warn!("Alpha Vantage info for {}: {}", symbol, msg);
        }
    }

    /// Percent change derived from an absolute change and the previous close.
    fn derive_change_pct(
        change: Option<Decimal>,
        previous_close: Option<Decimal>,
    ) -> Option<Decimal> {
        let (change, previous_close) = (change?, previous_close?);
        if previous_close.is_zero() {
            return None;
        }
        change
            .checked_mul(Decimal::ONE_HUNDRED)?
            .checked_div(previous_close)
            .map(|pct| pct.round_dp(4))
    }

    /// Turn a parsed GLOBAL_QUOTE response into a snapshot stamped with `fetched_at`.
    fn normalize(
        symbol: &str,
        response: GlobalQuoteResponse,
        fetched_at: DateTime<Utc>,
    ) -> FetchOutcome {
        Self::log_api_messages(symbol, &response);

        let Some(quote) = response.global_quote else {
            return FetchOutcome::NoData;
        };
        let Some(price) = quote.price.as_ref().and_then(parse_decimal) else {
            return FetchOutcome::NoData;
        };

        let previous_close = quote.previous_close.as_ref().and_then(parse_decimal);
        let change = quote
            .change
            .as_ref()
            .and_then(parse_decimal)
            .or_else(|| previous_close.map(|prev| price - prev));
        let change_pct = quote
            .change_percent
            .as_ref()
            .and_then(parse_percent)
            .or_else(|| Self::derive_change_pct(change, previous_close));

        FetchOutcome::Quote(Snapshot {
            symbol: symbol.to_string(),
            price,
            change,
            change_pct,
            ts: epoch_seconds(fetched_at),
            meta: quote.meta(),
            source: SOURCE_ALPHA_VANTAGE.to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 5,             // Free tier is very limited
            min_delay: Duration::from_secs(12), // ~5 requests per minute
        }
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<FetchOutcome, MarketDataError> {
        if symbol.trim().is_empty() {
            return Err(MarketDataError::InvalidSymbol(symbol.to_string()));
        }

        let params = [("function", "GLOBAL_QUOTE"), ("symbol", symbol)];
        let text = self.fetch(&params).await?;
        let fetched_at = Utc::now();
        let response = Self::parse_response(&text)?;

        let outcome = Self::normalize(symbol, response, fetched_at);
        match &outcome {
            FetchOutcome::Quote(snapshot) => {
                debug!("Alpha Vantage: {} @ {}", symbol, snapshot.price)
            }
            FetchOutcome::NoData => debug!("Alpha Vantage: no price for {}", symbol),
        }
        Ok(outcome)
    }
}
