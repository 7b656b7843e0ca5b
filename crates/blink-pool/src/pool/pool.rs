//! Pool manager: borrow/return protocol, lazy growth, maintenance, shutdown

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use blink_core::{BlinkError, ConnectOptions, Connection, Driver, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

use super::conn::PooledEntry;
use super::queue::{IdleQueue, TakeError};
use super::stats::PoolStats;
use crate::config::BlinkConfig;

/// How often the maintenance worker wakes to reconcile the idle population.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);

/// The pool manager.
///
/// Tracks exactly two observables: the idle queue and the `borrowing`
/// counter. Their sum is the live population, bounded by `max_pool_size`;
/// every creation re-checks that bound before publishing, and returns
/// decrement `borrowing` before re-enqueueing so the sum is never inflated
/// by a return in flight.
pub(crate) struct BlinkPool {
    config: BlinkConfig,
    driver: Arc<dyn Driver>,
    connect_opts: ConnectOptions,
    stats: PoolStats,
    /// Plain flag; a borrow racing shutdown may still succeed, and returns
    /// arriving after shutdown observe it and really close instead.
    closed: AtomicBool,
    /// Number of connections currently out with callers
    borrowing: AtomicI64,
    /// Baseline for the `last_active` slot
    started: Instant,
    /// Nanoseconds after `started` of the last borrow or return activity
    last_active_nanos: AtomicU64,
    idle: IdleQueue,
    /// Serialises the grow-to-min-idle path so racing fillers cannot
    /// overshoot
    create_lock: tokio::sync::Mutex<()>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl BlinkPool {
    /// Build the pool from an already-validated configuration.
    ///
    /// The first connection is opened synchronously so that a bad URL or
    /// refused credentials surface here rather than on a later borrow. The
    /// rest of `min_idle` fills inline or on a detached task per
    /// `async_init_idle`, after which the maintenance worker starts.
    pub(crate) async fn new(config: BlinkConfig, driver: Arc<dyn Driver>) -> Result<Arc<Self>> {
        let connect_opts = ConnectOptions {
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        };
        let capacity = config.max_pool_size as usize;
        let pool = Arc::new(Self {
            config,
            driver,
            connect_opts,
            stats: PoolStats::new(),
            closed: AtomicBool::new(false),
            borrowing: AtomicI64::new(0),
            started: Instant::now(),
            last_active_nanos: AtomicU64::new(0),
            idle: IdleQueue::new(capacity),
            create_lock: tokio::sync::Mutex::new(()),
            maintenance: Mutex::new(None),
        });

        pool.create_connection_into_pool().await?;

        if pool.config.min_idle > 1 {
            if pool.config.async_init_idle {
                let filler = Arc::clone(&pool);
                tokio::spawn(async move {
                    if let Err(e) = filler.create_min_idle().await {
                        tracing::warn!(
                            pool = %filler.config.pool_name,
                            error = %e,
                            "background initial idle fill failed"
                        );
                    }
                });
            } else {
                pool.create_min_idle().await?;
            }
        }

        pool.start_maintenance();
        Ok(pool)
    }

    pub(crate) fn config(&self) -> &BlinkConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current idle queue length.
    pub(crate) fn idle_len(&self) -> usize {
        self.idle.len()
    }

    /// Number of connections currently out with callers.
    pub(crate) fn borrowing(&self) -> i64 {
        self.borrowing.load(Ordering::SeqCst)
    }

    /// Stamp the last-activity slot. Lazy publish; the maintenance worker
    /// only needs an approximate reading.
    pub(crate) fn touch(&self, now: Instant) {
        let nanos = now.saturating_duration_since(self.started).as_nanos() as u64;
        self.last_active_nanos.store(nanos, Ordering::Relaxed);
    }

    fn elapsed_since_last_active(&self) -> Duration {
        let last = Duration::from_nanos(self.last_active_nanos.load(Ordering::Relaxed));
        self.started.elapsed().checked_sub(last).unwrap_or(Duration::ZERO)
    }

    /// Borrow a connection.
    ///
    /// Takes from the idle queue without waiting when it can; an empty queue
    /// triggers a best-effort detached refill and a bounded wait for
    /// whatever arrives first. Whatever is taken gets a liveness check, and
    /// a dead connection is replaced by one synchronous creation with no
    /// retry loop.
    pub(crate) async fn borrow_connection(self: &Arc<Self>) -> Result<PooledEntry> {
        if self.is_closed() {
            return Err(BlinkError::PoolClosed);
        }

        let mut entry = match self.idle.try_take() {
            Some(entry) => entry,
            None => {
                // Empty queue: grow toward min_idle off the borrow path.
                // The fill re-checks the population bound under the
                // creation lock, so firing it near the ceiling is harmless.
                if self.borrowing() < self.config.max_pool_size as i64 && self.idle.is_empty() {
                    let filler = Arc::clone(self);
                    tokio::spawn(async move {
                        if let Err(e) = filler.create_min_idle().await {
                            tracing::warn!(
                                pool = %filler.config.pool_name,
                                error = %e,
                                "background idle fill failed"
                            );
                        }
                    });
                }

                match self.idle.take(self.config.borrow_timeout()).await {
                    Ok(entry) => entry,
                    Err(TakeError::TimedOut) => {
                        return Err(BlinkError::BorrowTimeout(self.config.borrow_timeout()));
                    }
                    Err(TakeError::Closed) => {
                        return Err(if self.is_closed() {
                            BlinkError::PoolClosed
                        } else {
                            BlinkError::Interrupted
                        });
                    }
                }
            }
        };

        self.borrowing.fetch_add(1, Ordering::SeqCst);
        if entry.is_available(&self.config).await {
            return Ok(entry);
        }

        // Dead or expired: discard it and hand out one fresh replacement.
        self.borrowing.fetch_sub(1, Ordering::SeqCst);
        self.stats.record_invalid();
        self.close_quietly(entry.into_raw()).await;
        let fresh = self.new_entry().await?;
        self.borrowing.fetch_add(1, Ordering::SeqCst);
        Ok(fresh)
    }

    /// Hand a borrowed entry back to the pool.
    pub(crate) async fn release(&self, entry: PooledEntry) {
        let now = Instant::now();
        self.touch(now);
        if let Some(borrowed_at) = entry.last_borrow {
            self.stats.add_used_nanos(duration_as_nanos(now.saturating_duration_since(borrowed_at)));
        }
        self.borrowing.fetch_sub(1, Ordering::SeqCst);
        self.return_entry(entry).await;
    }

    /// Drop-path variant of [`BlinkPool::release`]: same bookkeeping, but a
    /// required real close is detached onto the runtime since drop cannot
    /// await.
    pub(crate) fn release_detached(&self, entry: PooledEntry) {
        let now = Instant::now();
        self.touch(now);
        if let Some(borrowed_at) = entry.last_borrow {
            self.stats.add_used_nanos(duration_as_nanos(now.saturating_duration_since(borrowed_at)));
        }
        self.borrowing.fetch_sub(1, Ordering::SeqCst);

        if self.is_closed() {
            self.close_detached(entry.into_raw());
            return;
        }
        match self.idle.offer(entry) {
            Ok(()) => self.stats.record_return(),
            Err(refused) => self.close_detached(refused.into_raw()),
        }
    }

    async fn return_entry(&self, entry: PooledEntry) {
        if self.is_closed() {
            self.close_quietly(entry.into_raw()).await;
            return;
        }

        match self.idle.offer(entry) {
            Ok(()) => self.stats.record_return(),
            Err(refused) => {
                self.close_quietly(refused.into_raw()).await;
                tracing::debug!(
                    pool = %self.config.pool_name,
                    "idle queue is full; closed the returned connection. If this repeats \
                     under load, consider raising max_pool_size"
                );
            }
        }
    }

    /// Open one raw session and wrap it with its randomised expiry deadline.
    async fn new_entry(&self) -> Result<PooledEntry> {
        let raw = self.driver.open(&self.connect_opts).await?;
        self.stats.record_creation();
        Ok(PooledEntry::new(raw, self.config.max_lifetime()))
    }

    /// Create one connection into the idle queue if the population bound
    /// allows it. Returns whether a connection was actually created.
    async fn create_connection_into_pool(&self) -> Result<bool> {
        if self.idle.len() as i64 + self.borrowing() >= self.config.max_pool_size as i64 {
            return Ok(false);
        }

        let entry = self.new_entry().await?;
        if let Err(refused) = self.idle.offer(entry) {
            self.close_quietly(refused.into_raw()).await;
            tracing::debug!(
                pool = %self.config.pool_name,
                "idle queue is full; closed the freshly created connection"
            );
        }
        Ok(true)
    }

    /// Grow the idle queue toward `min_idle`, serialised by the creation
    /// lock. Stops early when the population ceiling makes further growth
    /// impossible.
    async fn create_min_idle(&self) -> Result<()> {
        let _guard = self.create_lock.lock().await;
        while self.idle.len() < self.config.min_idle as usize {
            if !self.create_connection_into_pool().await? {
                break;
            }
        }
        Ok(())
    }

    fn start_maintenance(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MAINTENANCE_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval fires immediately; skip it so
            // the first real cycle runs a full period after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(pool) = weak.upgrade() else { break };
                if pool.is_closed() {
                    break;
                }
                pool.maintain_idle_connections().await;
            }
        });
        *self.maintenance.lock() = Some(handle);
    }

    /// One maintenance cycle: trim surplus idles, refill to `min_idle`, and
    /// repair wrapped counters. Skipped entirely while the pool has seen
    /// activity within `idle_timeout`, so a busy pool never churns its
    /// idles.
    async fn maintain_idle_connections(&self) {
        if self.elapsed_since_last_active() < self.config.idle_timeout() {
            return;
        }

        tracing::debug!(
            pool = %self.config.pool_name,
            idle = self.idle.len(),
            "reconciling idle connections against min_idle"
        );

        let min_idle = self.config.min_idle as usize;
        while self.idle.len() > min_idle {
            match self.idle.try_take() {
                Some(entry) => self.close_quietly(entry.into_raw()).await,
                None => break,
            }
        }

        if let Err(e) = self.create_min_idle().await {
            tracing::warn!(
                pool = %self.config.pool_name,
                error = %e,
                "failed to refill idle connections during maintenance"
            );
        }

        self.stats.fix_overflow();
    }

    /// Shut the pool down. Idempotent.
    ///
    /// Future borrows fail fast; blocked borrowers are woken; every idle
    /// connection is really closed. Connections currently out with callers
    /// are not revoked: their return path observes the closed flag and
    /// really closes them, so nothing leaks.
    pub(crate) async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.maintenance.lock().take() {
            handle.abort();
        }

        self.idle.close();
        for entry in self.idle.drain() {
            self.close_quietly(entry.into_raw()).await;
        }
        self.stats.reset_all();
        tracing::info!(pool = %self.config.pool_name, "connection pool shut down");
    }

    /// Really close a raw session, swallowing any error, and count it.
    async fn close_quietly(&self, raw: Arc<dyn Connection>) {
        if let Err(e) = raw.close().await {
            tracing::debug!(
                pool = %self.config.pool_name,
                error = %e,
                "failed to close a database connection"
            );
        }
        self.stats.record_real_close();
    }

    /// Count a real close and detach the actual close onto the runtime.
    /// Used from drop, which cannot await; without a runtime the session
    /// closes when its last reference drops.
    fn close_detached(&self, raw: Arc<dyn Connection>) {
        self.stats.record_real_close();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = raw.close().await;
            });
        }
    }
}

fn duration_as_nanos(d: Duration) -> i64 {
    d.as_nanos().min(i64::MAX as u128) as i64
}
