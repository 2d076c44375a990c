//! Application bootstrap implementation.
//!
//! This module contains `SiteTileApp`, which starts the spatial store pool
//! and the tile cache service before building the tile service on top of
//! them.

use std::sync::Arc;

use tracing::info;

use super::config::AppConfig;
use super::error::AppError;
use crate::cache::CacheService;
use crate::service::TileService;
use crate::store::{mask_password, PgSpatialStore, SpatialStore};

/// SiteTile application with service lifecycle management.
///
/// Services are started in dependency order:
/// 1. Spatial store connection pool
/// 2. Tile cache service
/// 3. Tile service facade over both
///
/// and shut down in reverse.
///
/// # Example
///
/// ```ignore
/// use sitetile::app::{AppConfig, SiteTileApp};
///
/// let config = AppConfig::new("postgres://tiles@localhost/sites");
/// let app = SiteTileApp::start(config).await?;
///
/// let payload = app.service().get_tile(&request).await?;
///
/// app.shutdown().await;
/// ```
pub struct SiteTileApp {
    /// Tile cache service (owns the provider).
    cache_service: CacheService,

    /// The PostGIS store, when the app connected it itself.
    pg_store: Option<PgSpatialStore>,

    /// Tile service facade.
    service: Arc<TileService>,

    /// Application configuration (retained for accessors).
    config: AppConfig,
}

impl SiteTileApp {
    /// Start the application with the given configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Application configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database pool cannot be created or the cache
    /// service fails to start.
    pub async fn start(config: AppConfig) -> Result<Self, AppError> {
        info!(
            database = %mask_password(&config.store.url),
            pool_size = config.store.pool_size,
            "Connecting spatial store"
        );
        let pg_store = PgSpatialStore::connect(&config.store)
            .await
            .map_err(AppError::StoreStart)?;

        let store: Arc<dyn SpatialStore> = Arc::new(pg_store.clone());
        Self::start_internal(store, Some(pg_store), config).await
    }

    /// Start the application over an existing spatial store.
    ///
    /// The store configuration in `config` is ignored.
    pub async fn start_with_store(
        store: Arc<dyn SpatialStore>,
        config: AppConfig,
    ) -> Result<Self, AppError> {
        Self::start_internal(store, None, config).await
    }

    async fn start_internal(
        store: Arc<dyn SpatialStore>,
        pg_store: Option<PgSpatialStore>,
        config: AppConfig,
    ) -> Result<Self, AppError> {
        info!("Starting SiteTileApp");

        let cache_service = CacheService::start(config.cache.clone())
            .await
            .map_err(AppError::CacheStart)?;

        let service = Arc::new(TileService::new(
            store,
            cache_service.cache(),
            config.service.clone(),
        ));

        info!(
            cache = cache_service.provider_name(),
            ttl_secs = config.service.ttl.as_secs(),
            extent = config.service.extent,
            coalesce = config.service.coalesce,
            "Tile service ready"
        );

        Ok(Self {
            cache_service,
            pg_store,
            service,
            config,
        })
    }

    /// The tile service facade.
    pub fn service(&self) -> Arc<TileService> {
        Arc::clone(&self.service)
    }

    /// Name of the running cache provider.
    pub fn cache_provider(&self) -> &'static str {
        self.cache_service.provider_name()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shutdown the application gracefully.
    ///
    /// Stops the cache service, then closes the database pool.
    pub async fn shutdown(self) {
        info!("Shutting down SiteTileApp");

        self.cache_service.shutdown().await;

        if let Some(store) = self.pg_store {
            store.close().await;
            info!("Spatial store disconnected");
        }

        info!("SiteTileApp shutdown complete");
    }
}
