pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use services::AllocationEngine;
use store::{MemorySeatStore, PostgresSeatStore, SeatStore};

// Shared state for every handler
#[derive(Clone, Debug)]
pub struct AppState {
    pub engine: AllocationEngine,
    pub config: config::Config,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl AppState {
    /// Connects the configured seat store and builds the engine on top of it.
    pub async fn new(config: config::Config) -> Result<Arc<Self>, StartupError> {
        let store: Arc<dyn SeatStore> = match &config.database {
            Some(db_config) => {
                let db = database::Database::new(db_config).await?;
                info!("Database connected");
                db.run_migrations().await?;
                Arc::new(PostgresSeatStore::new(&db))
            }
            None => {
                info!("DATABASE_URL not set, seats are kept in memory");
                Arc::new(MemorySeatStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: config::Config, store: Arc<dyn SeatStore>) -> Arc<Self> {
        let engine = AllocationEngine::new(store, config.booking);
        Arc::new(Self { engine, config })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Seat Reservation API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .merge(controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
