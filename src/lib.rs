pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use crate::config::{AppConfig, StorageBackend};
pub use db::create_pool;
pub use error::{LedgerError, Result};
pub use service::LedgerService;

use db::{MemoryOrders, MemoryStore, OrderSource, PgStore, StatementStore};
use models::OrderSeed;
use std::sync::Arc;
use tracing::info;

/// Reads the JSON order seed used by the in-memory backend.
pub fn load_order_seed(path: &str) -> Result<OrderSeed> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| LedgerError::Internal(format!("reading order seed {}: {}", path, e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| LedgerError::Internal(format!("parsing order seed {}: {}", path, e)))
}

/// Wires the configured backend into a ledger service.
pub async fn build_service(config: &AppConfig) -> Result<Arc<LedgerService>> {
    let (store, orders): (Arc<dyn StatementStore>, Arc<dyn OrderSource>) =
        match config.storage.backend {
            StorageBackend::Postgres => {
                let pool = create_pool(&config.database).await?;
                info!("Database pool created");
                if config.database.run_migrations {
                    db::run_migrations(&pool).await?;
                }
                let pg = Arc::new(PgStore::new(pool));
                let store: Arc<dyn StatementStore> = pg.clone();
                let orders: Arc<dyn OrderSource> = pg;
                (store, orders)
            }
            StorageBackend::Memory => {
                let seed = match &config.storage.seed_path {
                    Some(path) => load_order_seed(path)?,
                    None => OrderSeed::default(),
                };
                info!(
                    sites = seed.sites.len(),
                    base_orders = seed.base_orders.len(),
                    subcontract_orders = seed.subcontract_orders.len(),
                    "Using in-memory storage"
                );
                let store: Arc<dyn StatementStore> = Arc::new(MemoryStore::new());
                let orders: Arc<dyn OrderSource> = Arc::new(MemoryOrders::from_seed(seed));
                (store, orders)
            }
        };

    Ok(Arc::new(LedgerService::new(store, orders, &config.ledger)))
}
