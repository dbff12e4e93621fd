use anyhow::{anyhow, Context};
use axum::http::HeaderValue;
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use quotefeed_core::constants::{DEFAULT_COOLDOWN, DEFAULT_PACING, DEFAULT_TICKERS};
use quotefeed_core::ingest::{parse_symbols, IngestSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub history_dir: PathBuf,
    /// `None` when no credential is set; batches then report `config-missing`.
    pub api_key: Option<String>,
    pub ingest: IngestSettings,
    pub ingest_interval: Duration,
    pub ingest_initial_delay: Duration,
    pub provider_timeout: Duration,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

fn seconds(name: &str, raw: &str) -> anyhow::Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid {}: {:?}", name, raw))?;
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow!("Invalid {}: {:?} ({})", name, raw, e))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, applying defaults for unset keys.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let listen_addr: SocketAddr = var("QF_LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .context("Invalid QF_LISTEN_ADDR")?;
        let db_path = var("QF_DB_PATH", "./db/quotefeed.db");
        let history_dir = PathBuf::from(var("QF_HISTORY_DIR", "./db/history"));

        let api_key = lookup("ALPHAVANTAGE_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let pacing = match lookup("BETWEEN_CALL_SLEEP_SECS") {
            Some(raw) => seconds("BETWEEN_CALL_SLEEP_SECS", &raw)?,
            None => DEFAULT_PACING,
        };
        let cooldown = match lookup("COOLDOWN_SECS") {
            Some(raw) => seconds("COOLDOWN_SECS", &raw)?,
            None => DEFAULT_COOLDOWN,
        };
        let ingest = IngestSettings::new(
            parse_symbols(&var("TICKERS", DEFAULT_TICKERS)),
            pacing,
            cooldown,
        )
        .context("Invalid TICKERS")?;

        let ingest_interval = seconds(
            "QF_INGEST_INTERVAL_SECS",
            &var("QF_INGEST_INTERVAL_SECS", "36000"),
        )?;
        if ingest_interval.is_zero() {
            return Err(anyhow!("QF_INGEST_INTERVAL_SECS must be greater than zero"));
        }
        let ingest_initial_delay = seconds(
            "QF_INGEST_INITIAL_DELAY_SECS",
            &var("QF_INGEST_INITIAL_DELAY_SECS", "5"),
        )?;
        let provider_timeout = seconds(
            "QF_PROVIDER_TIMEOUT_SECS",
            &var("QF_PROVIDER_TIMEOUT_SECS", "15"),
        )?;

        let cors_allow: Vec<String> = var("QF_CORS_ALLOW_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in cors_allow.iter().filter(|o| o.as_str() != "*") {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid origin in QF_CORS_ALLOW_ORIGINS: {:?}", origin))?;
        }

        let timeout_ms: u64 = var("QF_REQUEST_TIMEOUT_MS", "30000")
            .trim()
            .parse()
            .context("Invalid QF_REQUEST_TIMEOUT_MS")?;

        let log_format = match var("QF_LOG_FORMAT", "text").trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => return Err(anyhow!("Invalid QF_LOG_FORMAT: {:?}", other)),
        };

        Ok(Self {
            listen_addr,
            db_path,
            history_dir,
            api_key,
            ingest,
            ingest_interval,
            ingest_initial_delay,
            provider_timeout,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            log_format,
        })
    }
}
