//! PostgreSQL store for the drop commerce engine.
//!
//! [`PgStore`] implements the storage ports of `drop-commerce-core` on top of
//! a `sqlx` connection pool. Every unit of work is one database transaction
//! ([`PgTx`]); dropping it without committing rolls it back.
//!
//! # Concurrency
//!
//! - Stock is reserved with a single conditional `UPDATE` whose affected-row
//!   count decides the outcome; the `inventory_reserved_within_stock` check
//!   constraint backs it up.
//! - Checkouts sharing an idempotency key are serialised with a
//!   transaction-scoped advisory lock on the hashed key.
//! - Queue joins lock the drop row (`SELECT … FOR UPDATE`) before reading the
//!   highest position.
//! - The sweeper claims expired rows with `FOR UPDATE SKIP LOCKED`, and status
//!   transitions are guarded on the current status.
//!
//! # Example
//!
//! ```no_run
//! use drop_commerce_postgres::{PgStore, PoolSettings};
//!
//! # async fn example() -> Result<(), drop_commerce_core::EngineError> {
//! let store = PgStore::connect("postgres://localhost/drops", &PoolSettings::default()).await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

mod rows;
mod tx;

pub use tx::PgTx;

use drop_commerce_core::store::Store;
use drop_commerce_core::{EngineError, EngineResult};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on open connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// PostgreSQL-backed [`Store`].
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if the connection fails.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> EngineResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| EngineError::Storage(format!("Failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> EngineResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::Storage(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> EngineResult<PgTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| EngineError::Storage(format!("Failed to begin transaction: {e}")))?;
        Ok(PgTx::new(tx))
    }

    async fn ping(&self) -> EngineResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::Storage(format!("Failed to ping database: {e}")))?;
        Ok(())
    }
}
