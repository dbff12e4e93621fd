use std::sync::Arc;

use crate::config::{Config, LogFormat};
use quotefeed_core::{
    clock::{Clock, SystemClock},
    ingest::{IngestSettings, IngestionService, IngestionServiceTrait},
    query::{QueryService, QueryServiceTrait},
    storage::{LatestStore, ObjectStore},
};
use quotefeed_market_data::{AlphaVantageProvider, QuoteProvider};
use quotefeed_storage_fs::FsObjectStore;
use quotefeed_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, LatestQuoteRepository,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub query_service: Arc<dyn QueryServiceTrait + Send + Sync>,
    pub ingestion_service: Arc<dyn IngestionServiceTrait + Send + Sync>,
    pub ingest_settings: IngestSettings,
}

impl AppState {
    /// Wires both services over the given stores.
    pub fn new(
        provider: Option<Arc<dyn QuoteProvider>>,
        latest: Arc<dyn LatestStore>,
        objects: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        ingest_settings: IngestSettings,
    ) -> Self {
        Self {
            query_service: Arc::new(QueryService::new(latest.clone(), objects.clone())),
            ingestion_service: Arc::new(IngestionService::new(provider, latest, objects, clock)),
            ingest_settings,
        }
    }
}

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

fn build_provider(config: &Config) -> Option<Arc<dyn QuoteProvider>> {
    let Some(api_key) = config.api_key.clone() else {
        tracing::warn!("ALPHAVANTAGE_API_KEY is not set; batches will report config-missing");
        return None;
    };

    let provider = AlphaVantageProvider::with_timeout(api_key, config.provider_timeout);
    let limit = provider.rate_limit();
    if !limit.is_respected_by(config.ingest.pacing()) {
        tracing::warn!(
            "Pacing of {:?} is below the provider's minimum delay of {:?} ({} requests/min)",
            config.ingest.pacing(),
            limit.min_delay,
            limit.requests_per_minute
        );
    }
    Some(Arc::new(provider))
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());
    let latest: Arc<dyn LatestStore> = Arc::new(LatestQuoteRepository::new(pool, writer));

    let objects: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(&config.history_dir).await?);
    tracing::info!("History directory in use: {}", config.history_dir.display());

    Ok(Arc::new(AppState::new(
        build_provider(config),
        latest,
        objects,
        Arc::new(SystemClock),
        config.ingest.clone(),
    )))
}
