//! Data source facade
//!
//! The external entry point: validates the configuration, resolves the
//! driver, constructs the pool, and exposes borrowing plus the metrics
//! surface.

use std::sync::Arc;

use blink_core::{BlinkError, Driver, DriverRegistry, Result};
use tokio::time::Instant;

use crate::config::BlinkConfig;
use crate::pool::{BlinkPool, PooledConnection, StatsSnapshot};

/// A pooled data source.
///
/// Construction validates the configuration, resolves the driver, and opens
/// the first connection synchronously, so a bad URL, unknown driver, or
/// refused credentials all fail here rather than on a later borrow.
pub struct BlinkDataSource {
    pool: Arc<BlinkPool>,
}

impl std::fmt::Debug for BlinkDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlinkDataSource").finish_non_exhaustive()
    }
}

impl BlinkDataSource {
    /// Create a data source, resolving the configured driver id in `registry`.
    pub async fn new(mut config: BlinkConfig, registry: &DriverRegistry) -> Result<Self> {
        config.validate_and_init()?;
        let driver = registry.get(config.driver_id()).ok_or_else(|| {
            BlinkError::Config(format!(
                "no driver registered under the id \"{}\"",
                config.driver_id()
            ))
        })?;
        Self::build(config, driver).await
    }

    /// Create a data source with an explicit driver, bypassing the registry.
    pub async fn with_driver(mut config: BlinkConfig, driver: Arc<dyn Driver>) -> Result<Self> {
        config.validate_and_init()?;
        Self::build(config, driver).await
    }

    async fn build(config: BlinkConfig, driver: Arc<dyn Driver>) -> Result<Self> {
        let pool = BlinkPool::new(config, driver).await?;
        tracing::info!(
            pool = %pool.config().pool_name,
            min_idle = pool.config().min_idle,
            max_pool_size = pool.config().max_pool_size,
            "connection pool created"
        );
        Ok(Self { pool })
    }

    /// Borrow a connection from the pool.
    ///
    /// Closing the returned handle gives the underlying session back to the
    /// pool. Fails with [`BlinkError::PoolClosed`] after shutdown, with
    /// [`BlinkError::BorrowTimeout`] when the pool stays saturated for the
    /// whole borrow timeout, and with [`BlinkError::Connect`] when replacing
    /// a dead connection fails.
    pub async fn get_connection(&self) -> Result<PooledConnection> {
        let start = Instant::now();
        let mut entry = self.pool.borrow_connection().await?;
        let end = Instant::now();

        let stats = self.pool.stats();
        stats.record_borrow();
        stats.add_borrow_nanos(end.saturating_duration_since(start).as_nanos() as i64);
        entry.last_borrow = Some(end);
        self.pool.touch(end);

        Ok(PooledConnection::new(entry, Arc::clone(&self.pool)))
    }

    /// Shut the pool down. Repeated calls are no-ops.
    pub async fn close(&self) {
        self.pool.shutdown().await;
    }

    /// Whether the pool has been shut down.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// The validated configuration this pool runs with.
    pub fn config(&self) -> &BlinkConfig {
        self.pool.config()
    }

    /// Number of idle connections currently in the pool.
    pub fn current_pool_size(&self) -> usize {
        self.pool.idle_len()
    }

    /// Number of connections currently out with callers.
    pub fn current_borrowings(&self) -> i64 {
        self.pool.borrowing()
    }

    /// Raw connections opened over the pool's lifetime.
    pub fn total_creations(&self) -> i64 {
        self.pool.stats().creations()
    }

    /// Raw connections really closed over the pool's lifetime.
    pub fn total_real_closeds(&self) -> i64 {
        self.pool.stats().real_closeds()
    }

    /// Connections handed out over the pool's lifetime.
    pub fn total_borrows(&self) -> i64 {
        self.pool.stats().borrows()
    }

    /// Connections re-enqueued over the pool's lifetime.
    pub fn total_returns(&self) -> i64 {
        self.pool.stats().returns()
    }

    /// Connections discarded after failing a liveness check.
    pub fn total_invalids(&self) -> i64 {
        self.pool.stats().invalids()
    }

    /// Cumulative time callers spent waiting to borrow, in milliseconds.
    pub fn borrow_sum_millis(&self) -> f64 {
        self.pool.stats().borrow_sum_nanos() as f64 / 1_000_000.0
    }

    /// Cumulative time connections spent out with callers, in milliseconds.
    pub fn used_sum_millis(&self) -> f64 {
        self.pool.stats().used_sum_nanos() as f64 / 1_000_000.0
    }

    /// Point-in-time copy of every pool counter.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.pool.stats().snapshot()
    }

    /// Log the headline pool numbers at info level.
    pub fn log_stats(&self) {
        let snapshot = self.stats_snapshot();
        tracing::info!(
            pool = %self.pool.config().pool_name,
            current_borrowings = self.current_borrowings(),
            current_pool_size = self.current_pool_size(),
            creations = snapshot.creations,
            real_closeds = snapshot.real_closeds,
            borrows = snapshot.borrows,
            returns = snapshot.returns,
            invalids = snapshot.invalids,
            "pool statistics"
        );
    }
}
