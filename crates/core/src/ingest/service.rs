//! Cooldown-gated batch ingestion.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::model::{
    BatchReport, FailureKind, IngestSettings, SkipReason, SymbolOutcome, REASON_CONFIG_MISSING,
    REASON_NO_DATA,
};
use crate::clock::Clock;
use crate::errors::Result;
use crate::storage::{ControlRecord, HistoryLog, LatestStore, ObjectStore};
use quotefeed_market_data::{epoch_seconds, FetchOutcome, QuoteProvider, Snapshot};

#[async_trait]
pub trait IngestionServiceTrait: Send + Sync {
    /// Runs one batch over the configured symbols.
    ///
    /// Never fails as a whole: problems are reported per symbol or as a skip.
    async fn run_batch(&self, settings: &IngestSettings) -> BatchReport;
}

pub struct IngestionService {
    /// `None` when no provider credential is configured.
    provider: Option<Arc<dyn QuoteProvider>>,
    latest: Arc<dyn LatestStore>,
    history: HistoryLog,
    clock: Arc<dyn Clock>,
}

impl IngestionService {
    pub fn new(
        provider: Option<Arc<dyn QuoteProvider>>,
        latest: Arc<dyn LatestStore>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            latest,
            history: HistoryLog::new(objects),
            clock,
        }
    }

    fn now_seconds(&self) -> f64 {
        epoch_seconds(self.clock.now())
    }

    /// Reads the control record and claims the batch.
    ///
    /// Returns the claimed record, or the reason the batch must not run.
    async fn claim(
        &self,
        settings: &IngestSettings,
    ) -> std::result::Result<ControlRecord, SkipReason> {
        let now = self.now_seconds();

        let previous = match self.latest.get_control() {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read control record, treating as absent: {}", e);
                None
            }
        };

        if let Some(record) = &previous {
            let elapsed = now - record.ts;
            let cooldown = settings.cooldown().as_secs_f64();
            if elapsed < cooldown {
                let remaining_secs = (cooldown - elapsed) as i64;
                info!("Cooldown active, {}s remaining", remaining_secs);
                return Err(SkipReason::CooldownActive { remaining_secs });
            }
        }

        let claimed = ControlRecord::new(now);
        match self.latest.swap_control(previous.as_ref(), &claimed).await {
            Ok(true) => Ok(claimed),
            Ok(false) => {
                info!("Control record changed since it was read, another batch owns this window");
                Err(SkipReason::InProgress)
            }
            Err(e) => {
                error!("Failed to claim control record: {}", e);
                Err(SkipReason::ControlStoreUnavailable(e.to_string()))
            }
        }
    }

    async fn rearm(&self, claimed: &ControlRecord) {
        let finished = ControlRecord::new(self.now_seconds());
        match self.latest.swap_control(Some(claimed), &finished).await {
            Ok(true) => debug!("Control record re-armed at {}", finished.ts),
            Ok(false) => warn!(
                "Control record was replaced during the batch, keeping the other writer's record"
            ),
            Err(e) => error!("Failed to re-arm control record: {}", e),
        }
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        self.latest.put_latest(snapshot).await?;
        self.history.put_history(snapshot).await?;
        Ok(())
    }

    async fn ingest_symbol(&self, provider: &dyn QuoteProvider, symbol: &str) -> SymbolOutcome {
        match provider.fetch_quote(symbol).await {
            Ok(FetchOutcome::Quote(snapshot)) => match self.persist(&snapshot).await {
                Ok(()) => {
                    debug!("Stored {} at {}", symbol, snapshot.price);
                    SymbolOutcome::success(symbol)
                }
                Err(e) => {
                    error!("Failed to persist {}: {}", symbol, e);
                    SymbolOutcome::failure(symbol, FailureKind::Persistence, e.to_string())
                }
            },
            Ok(FetchOutcome::NoData) => {
                info!("No price returned for {}", symbol);
                SymbolOutcome::failure(symbol, FailureKind::NoData, REASON_NO_DATA)
            }
            Err(e) => {
                warn!("Fetching {} failed: {}", symbol, e);
                let kind = if e.is_parse() {
                    FailureKind::Parse
                } else {
                    FailureKind::Upstream
                };
                SymbolOutcome::failure(symbol, kind, e.to_string())
            }
        }
    }
}

#[async_trait]
impl IngestionServiceTrait for IngestionService {
    async fn run_batch(&self, settings: &IngestSettings) -> BatchReport {
        let Some(provider) = self.provider.as_deref() else {
            warn!(
                "No provider credential configured, skipping {} symbols",
                settings.symbols().len()
            );
            return BatchReport::Ingested(
                settings
                    .symbols()
                    .iter()
                    .map(|s| {
                        SymbolOutcome::failure(s, FailureKind::ConfigMissing, REASON_CONFIG_MISSING)
                    })
                    .collect(),
            );
        };

        let claimed = match self.claim(settings).await {
            Ok(claimed) => claimed,
            Err(reason) => return BatchReport::Skipped(reason),
        };

        info!(
            "Starting batch for {} symbols via {}",
            settings.symbols().len(),
            provider.id()
        );

        let mut outcomes = Vec::with_capacity(settings.symbols().len());
        for (i, symbol) in settings.symbols().iter().enumerate() {
            if i > 0 && !settings.pacing().is_zero() {
                tokio::time::sleep(settings.pacing()).await;
            }
            outcomes.push(self.ingest_symbol(provider, symbol).await);
        }

        self.rearm(&claimed).await;

        let report = BatchReport::Ingested(outcomes);
        info!(
            "Batch finished: {} ok, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }
}
