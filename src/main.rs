//! Fynness ledger server
//!
//! ```text
//! fynness [serve]     run the HTTP API (default)
//! fynness reconcile   sweep every scope once and print the report
//! ```
//!
//! Configuration comes from the YAML file named by `FYNNESS_CONFIG`, with
//! `FYNNESS_BIND` and `DATABASE_URL` overrides.

use anyhow::{Result, bail};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fynness::config::{FynnessConfig, StorageBackend};
use fynness::core::store::LedgerStore;
use fynness::ledger::LedgerService;
use fynness::server::ServerBuilder;
use fynness::storage::InMemoryLedgerStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = FynnessConfig::load()?;

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "serve".to_string());
    let store = open_store(&config).await?;
    tracing::info!(storage = store.backend(), command = %command, "fynness starting");

    match command.as_str() {
        "serve" => {
            let addr = config.bind_addr()?;
            ServerBuilder::from_config(&config)
                .with_shared_store(store)
                .serve(addr)
                .await
        }
        "reconcile" => {
            let ledger = LedgerService::new(store, config.ledger.clone());
            let report = ledger.reconcile(None).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        other => bail!("unknown command '{}' (expected 'serve' or 'reconcile')", other),
    }
}

async fn open_store(config: &FynnessConfig) -> Result<Arc<dyn LedgerStore>> {
    match config.storage.backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryLedgerStore::new())),
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            let Some(url) = config.storage.database_url.as_deref() else {
                bail!("storage.database_url is required for the postgres backend");
            };
            let store = fynness::storage::PostgresLedgerStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            bail!("storage.backend is postgres but fynness was built without the `postgres` feature")
        }
    }
}
