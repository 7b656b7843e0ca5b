//! Pooled connection entry and caller handle

use std::sync::Arc;

use blink_core::{Connection, Result};
use rand::Rng;
use tokio::time::{Duration, Instant};

use super::pool::BlinkPool;
use crate::config::BlinkConfig;

/// One live raw session plus its pool bookkeeping.
///
/// An entry lives in exactly one place at a time: the idle queue, a caller's
/// [`PooledConnection`] handle, or nowhere (discarded). Exclusive ownership
/// is what lets the probe/borrow stamps be plain fields.
pub(crate) struct PooledEntry {
    raw: Arc<dyn Connection>,
    /// Absolute deadline after which this session must not be reused
    expires_at: Instant,
    /// When the last liveness probe actually ran; `None` before the first
    last_check: Option<Instant>,
    /// When the pool last handed this entry to a caller
    pub(crate) last_borrow: Option<Instant>,
}

impl PooledEntry {
    /// Wrap a freshly opened session.
    ///
    /// The expiry deadline is drawn uniformly from
    /// `[0.8 * max_lifetime, max_lifetime)` so connections created together
    /// do not all expire together and reconnect in a storm.
    pub(crate) fn new(raw: Arc<dyn Connection>, max_lifetime: Duration) -> Self {
        let lifetime_ms = max_lifetime.as_millis() as u64;
        let jittered_ms = rand::rng().random_range(lifetime_ms * 4 / 5..lifetime_ms);
        Self {
            raw,
            expires_at: Instant::now() + Duration::from_millis(jittered_ms),
            last_check: None,
            last_borrow: None,
        }
    }

    pub(crate) fn raw(&self) -> &Arc<dyn Connection> {
        &self.raw
    }

    pub(crate) fn into_raw(self) -> Arc<dyn Connection> {
        self.raw
    }

    pub(crate) fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Decide whether this entry can be handed to a caller.
    ///
    /// Expired-by-age entries are always unavailable. Otherwise the probe
    /// policy follows `check_interval_ms`: negative skips probing entirely,
    /// zero probes on every borrow, and a positive interval trusts the last
    /// probe result until the interval has elapsed.
    pub(crate) async fn is_available(&mut self, config: &BlinkConfig) -> bool {
        let now = Instant::now();
        if now >= self.expires_at {
            return false;
        }

        let interval = config.check_interval_ms;
        if interval < 0 {
            return true;
        }
        if interval == 0 {
            return self.probe(config).await;
        }

        if let Some(last) = self.last_check
            && now.duration_since(last) < Duration::from_millis(interval as u64)
        {
            return true;
        }

        let alive = self.probe(config).await;
        self.last_check = Some(Instant::now());
        alive
    }

    /// Run one liveness probe against the raw session.
    async fn probe(&self, config: &BlinkConfig) -> bool {
        match &config.check_sql {
            None => !self.raw.is_closed() && self.raw.is_valid(config.check_timeout()).await,
            Some(sql) => match self.raw.execute(sql).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(
                        pool = %config.pool_name,
                        error = %e,
                        "liveness probe statement failed; treating the connection as dead"
                    );
                    false
                }
            },
        }
    }
}

/// A connection borrowed from the pool.
///
/// Behaves like a direct session for the operations the pool exposes;
/// closing the handle returns the underlying session to the pool instead of
/// tearing it down. A handle dropped without an explicit
/// [`PooledConnection::close`] is returned on drop as a safety net.
pub struct PooledConnection {
    entry: Option<PooledEntry>,
    pool: Arc<BlinkPool>,
}

impl PooledConnection {
    pub(crate) fn new(entry: PooledEntry, pool: Arc<BlinkPool>) -> Self {
        Self {
            entry: Some(entry),
            pool,
        }
    }

    /// The underlying raw session, for operations beyond the pool's surface.
    pub fn raw(&self) -> &Arc<dyn Connection> {
        self.entry.as_ref().expect("connection already closed").raw()
    }

    /// Driver identifier of the underlying session.
    pub fn driver_name(&self) -> &str {
        self.raw().driver_name()
    }

    /// Execute a statement on the underlying session.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        self.raw().execute(sql).await
    }

    /// When this connection must no longer be reused by the pool.
    pub fn expires_at(&self) -> Instant {
        self.entry.as_ref().expect("connection already closed").expires_at()
    }

    /// Return the underlying session to the pool.
    ///
    /// The session is re-enqueued for the next borrower unless the pool has
    /// shut down or the idle queue is full, in which case it is really
    /// closed. Failures on that close are logged and swallowed.
    pub async fn close(mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.release(entry).await;
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            self.pool.release_detached(entry);
        }
    }
}
