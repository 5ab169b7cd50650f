//! Process-wide wiring: builds every service once and owns their background
//! tasks until `shutdown`.

use crate::api::ApiState;
use crate::config::Config;
use crate::field_mapping::FieldMappingService;
use crate::providers::{self, TranslationProvider};
use crate::scheduler;
use crate::service::TranslationService;
use crate::storage::{MemoryRowStore, PgRowStore, RowStore};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::JobScheduler;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct AppServices {
    pub config: Arc<Config>,
    pub translator: Arc<TranslationService>,
    pub field_mappings: Arc<FieldMappingService>,
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    scheduler: JobScheduler,
}

impl AppServices {
    /// Build providers and storage from `config`, then start everything.
    pub async fn start(config: Config) -> Result<Self> {
        let providers = providers::build_providers(&config)?;
        let store = connect_row_store(&config).await?;
        Self::start_with(config, providers, store).await
    }

    /// Start with explicit providers and row store.
    pub async fn start_with(
        config: Config,
        providers: Vec<Arc<dyn TranslationProvider>>,
        store: Arc<dyn RowStore>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let translator = Arc::new(TranslationService::new(&config, providers));
        info!(
            "Translation providers (priority order): {}",
            translator.provider_names().join(", ")
        );

        let field_mappings =
            Arc::new(field_mapping_service(&config, Arc::clone(&translator), store).await?);

        let shutdown = CancellationToken::new();
        let workers = translator
            .queue()
            .start(config.queue_workers, translator.clone(), shutdown.clone())
            .await?;

        let scheduler = scheduler::start_scheduler(
            &config.maintenance_cron,
            Arc::clone(&translator),
            config.job_retention,
        )
        .await?;

        Ok(Self {
            config,
            translator,
            field_mappings,
            shutdown,
            workers,
            scheduler,
        })
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            translator: Arc::clone(&self.translator),
            field_mappings: Arc::clone(&self.field_mappings),
            debug_errors: self.config.debug_errors,
        }
    }

    /// Token that fires when shutdown begins
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop queue workers and the scheduler. Jobs still queued stay queued.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down translation services");
        self.shutdown.cancel();

        for worker in self.workers.drain(..) {
            if tokio::time::timeout(Duration::from_secs(10), worker).await.is_err() {
                warn!("Queue worker did not stop within 10s");
            }
        }
        self.scheduler.shutdown().await?;

        info!("✓ Shutdown complete");
        Ok(())
    }
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise process memory
pub async fn connect_row_store(config: &Config) -> Result<Arc<dyn RowStore>> {
    Ok(match &config.database_url {
        Some(url) => Arc::new(PgRowStore::connect(url).await?),
        None => {
            warn!("DATABASE_URL not set; bulk translation uses an in-memory row store");
            Arc::new(MemoryRowStore::new())
        }
    })
}

pub async fn field_mapping_service(
    config: &Config,
    translator: Arc<TranslationService>,
    store: Arc<dyn RowStore>,
) -> Result<FieldMappingService> {
    let service = FieldMappingService::new(translator, store);
    match &config.field_mappings_file {
        Some(path) => service.with_persistence(path).await,
        None => Ok(service),
    }
}
