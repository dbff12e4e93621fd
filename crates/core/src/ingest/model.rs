//! Batch settings and outcome types.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::constants::CONTROL_SYMBOL;
use crate::errors::{Result, ValidationError};

/// Reason recorded for every symbol when no provider credential is configured.
pub const REASON_CONFIG_MISSING: &str = "config-missing";

/// Reason recorded when the provider answered without a price.
pub const REASON_NO_DATA: &str = "no-data";

/// Splits a comma-separated ticker list, trimming blanks.
pub fn parse_symbols(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_symbol(symbol: &str) -> Result<()> {
    let reason = if symbol.is_empty() {
        Some("empty symbol")
    } else if symbol == CONTROL_SYMBOL {
        Some("reserved for the control record")
    } else if symbol.contains('/') {
        Some("must not contain '/'")
    } else if symbol.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidationError::InvalidSymbol {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

/// What one batch run should do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestSettings {
    symbols: Vec<String>,
    pacing: Duration,
    cooldown: Duration,
}

impl IngestSettings {
    /// Validates the ticker list. Duplicates are dropped, keeping the first occurrence.
    pub fn new(symbols: Vec<String>, pacing: Duration, cooldown: Duration) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            validate_symbol(&symbol)?;
            if seen.insert(symbol.clone()) {
                unique.push(symbol);
            }
        }

        Ok(Self {
            symbols: unique,
            pacing,
            cooldown,
        })
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

/// Why a symbol did not make it into the stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    ConfigMissing,
    NoData,
    Upstream,
    Parse,
    Persistence,
}

/// Result for one symbol of a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip)]
    pub failure: Option<FailureKind>,
}

impl SymbolOutcome {
    pub fn success(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ok: true,
            reason: None,
            failure: None,
        }
    }

    pub fn failure(
        symbol: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            ok: false,
            reason: Some(reason.into()),
            failure: Some(kind),
        }
    }
}

/// Why a whole batch was skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The previous batch finished less than one cooldown ago.
    CooldownActive { remaining_secs: i64 },
    /// Another invocation claimed the control record first.
    InProgress,
    /// The control record could not be claimed.
    ControlStoreUnavailable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CooldownActive { remaining_secs } => {
                write!(f, "cooldown active; {}s remaining", remaining_secs)
            }
            Self::InProgress => write!(f, "batch already in progress"),
            Self::ControlStoreUnavailable(message) => {
                write!(f, "control record unavailable: {}", message)
            }
        }
    }
}

/// Aggregate result of one `run_batch` call.
///
/// Serializes as `{"skipped":true,"reason":"..."}` or `{"ingested":[...]}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchReport {
    Skipped(SkipReason),
    Ingested(Vec<SymbolOutcome>),
}

impl BatchReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    /// Per-symbol outcomes, empty when the batch was skipped.
    pub fn outcomes(&self) -> &[SymbolOutcome] {
        match self {
            Self::Skipped(_) => &[],
            Self::Ingested(outcomes) => outcomes,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes().iter().filter(|o| o.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes().iter().filter(|o| !o.ok).count()
    }
}

impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Skipped(reason) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("skipped", &true)?;
                map.serialize_entry("reason", &reason.to_string())?;
                map.end()
            }
            Self::Ingested(outcomes) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("ingested", outcomes)?;
                map.end()
            }
        }
    }
}
