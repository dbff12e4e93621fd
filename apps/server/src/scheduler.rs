//! Background scheduler for periodic quote ingestion.
//!
//! Each tick runs one batch; the cooldown gate inside the batch decides whether
//! anything is actually fetched.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::main_lib::AppState;
use quotefeed_core::ingest::BatchReport;

/// Starts the background ingestion scheduler.
pub fn start_ingest_scheduler(
    state: Arc<AppState>,
    initial_delay: Duration,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Ingest scheduler started ({:?} interval)", period);

        // Let the server finish starting before the first batch
        tokio::time::sleep(initial_delay).await;

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            run_scheduled_ingest(&state).await;
        }
    })
}

/// Runs a single batch and logs its report.
pub async fn run_scheduled_ingest(state: &AppState) -> BatchReport {
    let report = state
        .ingestion_service
        .run_batch(&state.ingest_settings)
        .await;

    let summary = serde_json::to_string(&report).unwrap_or_else(|e| e.to_string());
    match &report {
        BatchReport::Skipped(reason) => {
            info!(result = %summary, "Scheduled ingest skipped: {}", reason)
        }
        BatchReport::Ingested(_) if report.failed() > 0 => warn!(
            result = %summary,
            "Scheduled ingest finished: {} ok, {} failed",
            report.succeeded(),
            report.failed()
        ),
        BatchReport::Ingested(_) => info!(
            result = %summary,
            "Scheduled ingest finished: {} ok",
            report.succeeded()
        ),
    }
    report
}
