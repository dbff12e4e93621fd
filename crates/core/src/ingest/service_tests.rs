//! Tests for the batch ingestion contract.
//!
//! # Contract Points
//!
//! 1. Cooldown: a batch inside the window performs no writes and no fetches
//! 2. Claim: losing the control record swap skips the batch
//! 3. Isolation: fetch and persistence failures affect only their own symbol
//! 4. Re-arm: the control record is written after the loop regardless of outcomes
//! 5. Credential: without a provider nothing is fetched and the control record is untouched

#[cfg(test)]
mod tests {
    use crate::clock::{Clock, ManualClock};
    use crate::errors::{Error, Result};
    use crate::ingest::{
        BatchReport, FailureKind, IngestSettings, IngestionService, IngestionServiceTrait,
        SkipReason,
    };
    use crate::storage::memory::{InMemoryLatestStore, InMemoryObjectStore};
    use crate::storage::{ControlRecord, HistoryLog, LatestStore, ObjectStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use quotefeed_market_data::{
        epoch_seconds, FetchOutcome, MarketDataError, QuoteProvider, Snapshot,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const COOLDOWN_SECS: i64 = 36_000;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn settings(symbols: &[&str], pacing: Duration) -> IngestSettings {
        IngestSettings::new(
            symbols.iter().map(|s| s.to_string()).collect(),
            pacing,
            Duration::from_secs(COOLDOWN_SECS as u64),
        )
        .unwrap()
    }

    // =========================================================================
    // Mock QuoteProvider
    // =========================================================================

    #[derive(Clone)]
    enum Canned {
        Price(Decimal),
        NoData,
        Upstream,
        Parse,
    }

    struct MockProvider {
        responses: HashMap<String, Canned>,
        clock: Arc<ManualClock>,
        /// Each fetch moves the clock forward by this much.
        step: ChronoDuration,
        calls: Mutex<Vec<(String, tokio::time::Instant)>>,
    }

    impl MockProvider {
        fn new(clock: Arc<ManualClock>, responses: &[(&str, Canned)]) -> Self {
            Self {
                responses: responses
                    .iter()
                    .map(|(s, c)| (s.to_string(), c.clone()))
                    .collect(),
                clock,
                step: ChronoDuration::seconds(1),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn called_symbols(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
        }

        fn call_instants(&self) -> Vec<tokio::time::Instant> {
            self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
        }
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        fn id(&self) -> &'static str {
            "mock"
        }

        async fn fetch_quote(
            &self,
            symbol: &str,
        ) -> std::result::Result<FetchOutcome, MarketDataError> {
            self.calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), tokio::time::Instant::now()));
            let ts = epoch_seconds(self.clock.now());
            self.clock.advance(self.step);

            match self.responses.get(symbol).cloned().unwrap_or(Canned::NoData) {
                Canned::Price(price) => {
                    let mut snapshot = Snapshot::new(symbol, price, ts);
                    snapshot.change = Some(dec!(-1.2));
                    Ok(FetchOutcome::Quote(snapshot))
                }
                Canned::NoData => Ok(FetchOutcome::NoData),
                Canned::Upstream => Err(MarketDataError::Upstream {
                    provider: "mock".to_string(),
                    message: "HTTP 500".to_string(),
                }),
                Canned::Parse => Err(MarketDataError::Parse {
                    provider: "mock".to_string(),
                    message: "payload is not an object".to_string(),
                }),
            }
        }
    }

    // =========================================================================
    // Interfering LatestStore
    // =========================================================================

    /// Delegates to an in-memory store, optionally failing writes for one symbol
    /// or letting a competing writer replace the control record before the Nth swap.
    #[derive(Default)]
    struct InterferingLatestStore {
        inner: InMemoryLatestStore,
        fail_put_for: Option<String>,
        interfere_on_swap: Option<usize>,
        swaps: AtomicUsize,
    }

    #[async_trait]
    impl LatestStore for InterferingLatestStore {
        async fn put_latest(&self, snapshot: &Snapshot) -> Result<()> {
            if self.fail_put_for.as_deref() == Some(snapshot.symbol.as_str()) {
                return Err(Error::Unexpected("Intentional write failure".into()));
            }
            self.inner.put_latest(snapshot).await
        }

        fn get_latest(&self, symbol: &str) -> Result<Option<Snapshot>> {
            self.inner.get_latest(symbol)
        }

        fn get_control(&self) -> Result<Option<ControlRecord>> {
            self.inner.get_control()
        }

        async fn swap_control(
            &self,
            expected: Option<&ControlRecord>,
            next: &ControlRecord,
        ) -> Result<bool> {
            let n = self.swaps.fetch_add(1, Ordering::SeqCst);
            if self.interfere_on_swap == Some(n) {
                self.inner.set_control(Some(ControlRecord::new(1.0)));
            }
            self.inner.swap_control(expected, next).await
        }
    }

    struct Fixture {
        clock: Arc<ManualClock>,
        provider: Arc<MockProvider>,
        latest: Arc<InMemoryLatestStore>,
        objects: Arc<InMemoryObjectStore>,
        service: IngestionService,
    }

    fn fixture(responses: &[(&str, Canned)]) -> Fixture {
        let clock = Arc::new(ManualClock::new(start()));
        let provider = Arc::new(MockProvider::new(clock.clone(), responses));
        let latest = Arc::new(InMemoryLatestStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let service = IngestionService::new(
            Some(provider.clone()),
            latest.clone(),
            objects.clone(),
            clock.clone(),
        );
        Fixture {
            clock,
            provider,
            latest,
            objects,
            service,
        }
    }

    // =========================================================================
    // Cooldown
    // =========================================================================

    #[tokio::test]
    async fn test_batch_inside_cooldown_is_skipped_without_writes() {
        let f = fixture(&[("AAPL", Canned::Price(dec!(187.5)))]);
        let previous = epoch_seconds(start());
        f.latest.set_control(Some(ControlRecord::new(previous)));
        f.clock
            .set(start() + ChronoDuration::seconds(COOLDOWN_SECS - 1));

        let report = f.service.run_batch(&settings(&["AAPL"], Duration::ZERO)).await;

        assert_eq!(
            report,
            BatchReport::Skipped(SkipReason::CooldownActive { remaining_secs: 1 })
        );
        assert_eq!(f.latest.write_count(), 0);
        assert_eq!(f.objects.write_count(), 0);
        assert!(f.provider.called_symbols().is_empty());
        assert_eq!(f.latest.get_control().unwrap(), Some(ControlRecord::new(previous)));
    }

    #[tokio::test]
    async fn test_batch_after_cooldown_proceeds() {
        let f = fixture(&[("AAPL", Canned::Price(dec!(187.5)))]);
        f.latest
            .set_control(Some(ControlRecord::new(epoch_seconds(start()))));
        f.clock
            .set(start() + ChronoDuration::seconds(COOLDOWN_SECS + 1));

        let report = f.service.run_batch(&settings(&["AAPL"], Duration::ZERO)).await;

        assert!(!report.is_skipped());
        assert_eq!(report.succeeded(), 1);
        assert_eq!(f.latest.get_latest("AAPL").unwrap().unwrap().price, dec!(187.5));
        assert_eq!(f.objects.len(), 1);
    }

    #[tokio::test]
    async fn test_second_batch_within_window_is_skipped() {
        let f = fixture(&[("AAPL", Canned::Price(dec!(1)))]);
        let batch = settings(&["AAPL"], Duration::ZERO);

        assert!(!f.service.run_batch(&batch).await.is_skipped());
        f.clock.advance(ChronoDuration::hours(1));
        let second = f.service.run_batch(&batch).await;

        assert!(matches!(
            second,
            BatchReport::Skipped(SkipReason::CooldownActive { remaining_secs })
                if remaining_secs > 0
        ));
        assert_eq!(f.provider.called_symbols(), vec!["AAPL"]);
    }

    // =========================================================================
    // Claim and re-arm
    // =========================================================================

    #[tokio::test]
    async fn test_lost_claim_reports_batch_in_progress() {
        let clock = Arc::new(ManualClock::new(start()));
        let provider = Arc::new(MockProvider::new(
            clock.clone(),
            &[("AAPL", Canned::Price(dec!(1)))],
        ));
        let latest = Arc::new(InterferingLatestStore {
            interfere_on_swap: Some(0),
            ..Default::default()
        });
        let objects = Arc::new(InMemoryObjectStore::new());
        let service =
            IngestionService::new(Some(provider.clone()), latest.clone(), objects.clone(), clock);

        let report = service.run_batch(&settings(&["AAPL"], Duration::ZERO)).await;

        assert_eq!(report, BatchReport::Skipped(SkipReason::InProgress));
        assert_eq!(
            serde_json::to_value(&report).unwrap()["reason"],
            "batch already in progress"
        );
        assert!(provider.called_symbols().is_empty());
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn test_lost_rearm_keeps_other_writers_record() {
        let clock = Arc::new(ManualClock::new(start()));
        let provider = Arc::new(MockProvider::new(
            clock.clone(),
            &[("AAPL", Canned::Price(dec!(1)))],
        ));
        let latest = Arc::new(InterferingLatestStore {
            interfere_on_swap: Some(1),
            ..Default::default()
        });
        let service = IngestionService::new(
            Some(provider),
            latest.clone(),
            Arc::new(InMemoryObjectStore::new()),
            clock,
        );

        let report = service.run_batch(&settings(&["AAPL"], Duration::ZERO)).await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(latest.get_control().unwrap(), Some(ControlRecord::new(1.0)));
    }

    #[tokio::test]
    async fn test_control_record_rearmed_with_end_time_despite_failures() {
        let f = fixture(&[
            ("AAPL", Canned::Upstream),
            ("MSFT", Canned::NoData),
            ("NVDA", Canned::Parse),
        ]);

        let report = f
            .service
            .run_batch(&settings(&["AAPL", "MSFT", "NVDA"], Duration::ZERO))
            .await;

        assert_eq!(report.failed(), 3);
        // the mock advances the clock one second per fetch
        let expected = epoch_seconds(start() + ChronoDuration::seconds(3));
        assert_eq!(f.latest.get_control().unwrap(), Some(ControlRecord::new(expected)));
    }

    #[tokio::test]
    async fn test_overlapping_batches_ingest_once() {
        let f = fixture(&[("AAPL", Canned::Price(dec!(1))), ("MSFT", Canned::Price(dec!(2)))]);
        let batch = settings(&["AAPL", "MSFT"], Duration::ZERO);

        let (a, b) = tokio::join!(f.service.run_batch(&batch), f.service.run_batch(&batch));

        assert_eq!([a.is_skipped(), b.is_skipped()].iter().filter(|s| **s).count(), 1);
        assert_eq!(f.provider.called_symbols(), vec!["AAPL", "MSFT"]);
    }

    // =========================================================================
    // Per-symbol isolation
    // =========================================================================

    #[tokio::test]
    async fn test_upstream_failure_on_middle_symbol_is_isolated() {
        let f = fixture(&[
            ("AAPL", Canned::Price(dec!(187.5))),
            ("MSFT", Canned::Upstream),
            ("NVDA", Canned::Price(dec!(900.1))),
        ]);

        let report = f
            .service
            .run_batch(&settings(&["AAPL", "MSFT", "NVDA"], Duration::ZERO))
            .await;

        let outcomes = report.outcomes();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes.iter().map(|o| o.symbol.as_str()).collect::<Vec<_>>(),
            vec!["AAPL", "MSFT", "NVDA"]
        );
        assert!(outcomes[0].ok);
        assert!(!outcomes[1].ok);
        assert_eq!(outcomes[1].failure, Some(FailureKind::Upstream));
        assert_eq!(
            outcomes[1].reason.as_deref(),
            Some("Upstream error: mock - HTTP 500")
        );
        assert!(outcomes[2].ok);
        assert!(f.latest.get_latest("MSFT").unwrap().is_none());
        assert_eq!(f.objects.len(), 2);
    }

    #[tokio::test]
    async fn test_no_data_and_parse_failures_write_nothing() {
        let f = fixture(&[("AAPL", Canned::NoData), ("MSFT", Canned::Parse)]);

        let report = f
            .service
            .run_batch(&settings(&["AAPL", "MSFT"], Duration::ZERO))
            .await;

        let outcomes = report.outcomes();
        assert_eq!(outcomes[0].reason.as_deref(), Some("no-data"));
        assert_eq!(outcomes[0].failure, Some(FailureKind::NoData));
        assert_eq!(outcomes[1].failure, Some(FailureKind::Parse));
        assert!(f.objects.is_empty());
        // claim and re-arm only
        assert_eq!(f.latest.write_count(), 2);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_isolated() {
        let clock = Arc::new(ManualClock::new(start()));
        let provider = Arc::new(MockProvider::new(
            clock.clone(),
            &[
                ("AAPL", Canned::Price(dec!(1))),
                ("MSFT", Canned::Price(dec!(2))),
                ("NVDA", Canned::Price(dec!(3))),
            ],
        ));
        let latest = Arc::new(InterferingLatestStore {
            fail_put_for: Some("MSFT".to_string()),
            ..Default::default()
        });
        let objects = Arc::new(InMemoryObjectStore::new());
        let service = IngestionService::new(Some(provider), latest.clone(), objects.clone(), clock);

        let report = service
            .run_batch(&settings(&["AAPL", "MSFT", "NVDA"], Duration::ZERO))
            .await;

        let outcomes = report.outcomes();
        assert!(outcomes[0].ok);
        assert_eq!(outcomes[1].failure, Some(FailureKind::Persistence));
        assert!(outcomes[2].ok);
        assert_eq!(objects.len(), 2);
        assert!(latest.get_latest("NVDA").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_success_writes_latest_and_history() {
        let f = fixture(&[("AAPL", Canned::Price(dec!(123.45)))]);

        f.service.run_batch(&settings(&["AAPL"], Duration::ZERO)).await;

        let stored = f.latest.get_latest("AAPL").unwrap().unwrap();
        assert_eq!(stored.price, dec!(123.45));
        assert_eq!(stored.ts, epoch_seconds(start()));

        let history = HistoryLog::new(f.objects.clone());
        let keys = history.list_history_keys("AAPL", 10).await.unwrap();
        assert_eq!(keys, vec![format!("AAPL/{}", start().timestamp()) + ".json"]);
        assert_eq!(history.get_history_object(&keys[0]).await.unwrap(), stored);
    }

    // =========================================================================
    // Missing credential
    // =========================================================================

    #[tokio::test]
    async fn test_missing_provider_reports_config_missing() {
        let latest = Arc::new(InMemoryLatestStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let existing = ControlRecord::new(42.0);
        latest.set_control(Some(existing.clone()));
        let service = IngestionService::new(
            None,
            latest.clone(),
            objects.clone() as Arc<dyn ObjectStore>,
            Arc::new(ManualClock::new(start())),
        );

        let report = service
            .run_batch(&settings(&["AAPL", "MSFT"], Duration::from_secs(1)))
            .await;

        let outcomes = report.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| !o.ok && o.reason.as_deref() == Some("config-missing")));
        assert_eq!(latest.get_control().unwrap(), Some(existing));
        assert_eq!(latest.write_count(), 0);
        assert!(objects.is_empty());
    }

    // =========================================================================
    // Pacing
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_symbols_only() {
        let f = fixture(&[
            ("AAPL", Canned::Price(dec!(1))),
            ("MSFT", Canned::Upstream),
            ("NVDA", Canned::Price(dec!(3))),
        ]);
        let pacing = Duration::from_secs(2);
        let began = tokio::time::Instant::now();

        f.service
            .run_batch(&settings(&["AAPL", "MSFT", "NVDA"], pacing))
            .await;

        let calls = f.provider.call_instants();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= pacing);
        assert!(calls[2] - calls[1] >= pacing);
        // no trailing wait after the last symbol
        let elapsed = began.elapsed();
        assert!(elapsed >= pacing * 2 && elapsed < pacing * 3);
    }
}
