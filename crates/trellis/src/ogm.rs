//! Mapper entry point: startup checks and session factory

use crate::config::Config;
use crate::error::Result;
use crate::index;
use crate::session::Session;
use std::sync::Arc;
use trellis_core::Catalog;
use trellis_driver::{AccessMode, MemoryPool, Pool};

/// A configured mapper bound to one catalog and one connection pool
pub struct Ogm {
    config: Config,
    catalog: Arc<Catalog>,
    pool: Arc<dyn Pool>,
}

impl Ogm {
    /// Validate the config, check the pool is reachable, then apply the
    /// configured index strategy. Any failure aborts startup.
    pub async fn init(
        config: Config,
        catalog: impl Into<Arc<Catalog>>,
        pool: Arc<dyn Pool>,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = catalog.into();

        pool.verify().await?;
        index::apply(config.index_strategy, &catalog, &pool).await?;

        tracing::info!(
            "Trellis initialized for {} with {} entity types (index strategy: {})",
            config.uri(),
            catalog.len(),
            config.index_strategy
        );
        Ok(Self {
            config,
            catalog,
            pool,
        })
    }

    /// Start against an in-memory graph sized by `config.pool_size`
    pub async fn in_memory(config: Config, catalog: impl Into<Arc<Catalog>>) -> Result<Self> {
        let pool = Arc::new(MemoryPool::with_capacity(config.pool_size));
        Self::init(config, catalog, pool).await
    }

    /// Open a session on its own connection
    pub async fn session(&self, mode: AccessMode) -> Result<Session> {
        let conn = self.pool.open(mode).await?;
        Ok(Session::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.pool),
            conn,
            self.config.default_depth,
        ))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close the pool; sessions opened afterwards fail
    pub async fn shutdown(&self) -> Result<()> {
        self.pool.close().await?;
        tracing::info!("Trellis shut down");
        Ok(())
    }
}

impl std::fmt::Debug for Ogm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ogm")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}
