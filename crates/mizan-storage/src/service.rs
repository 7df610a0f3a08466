use anyhow::{Context, Result};
use mizan_core::books::{Books, BooksSnapshot, ChangeSet};
use mizan_primitives::Currency;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::instrument;

use crate::{
    config::StorageConfig,
    postgres::{self, recovery},
};

/// Storage facade over the `PostgreSQL` pool.
#[derive(Clone)]
pub struct StorageService {
    pg: PgPool,
}

impl StorageService {
    /// Connect to `PostgreSQL` and run migrations.
    #[instrument(skip(config), fields(pg_pool_size = config.pg_pool_size))]
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let pg = PgPoolOptions::new()
            .max_connections(config.pg_pool_size)
            .connect(&config.pg_url)
            .await
            .context("failed to connect to PostgreSQL")?;

        sqlx::migrate!("./migrations")
            .run(&pg)
            .await
            .context("failed to run PostgreSQL migrations")?;

        Ok(Self { pg })
    }

    /// Persist one write's changes in a single database transaction.
    pub async fn persist(&self, changes: &ChangeSet) -> Result<()> {
        postgres::persist_changes(&self.pg, changes).await
    }

    /// Load every persisted record.
    pub async fn load_snapshot(&self) -> Result<BooksSnapshot> {
        recovery::load_snapshot(&self.pg).await
    }

    /// Rebuild verified books from the database.
    pub async fn recover(&self, currency: Currency) -> Result<Books> {
        recovery::recover_books(&self.pg, currency).await
    }

    /// Expose the underlying pool for direct query access.
    pub fn pool(&self) -> &PgPool {
        &self.pg
    }
}
