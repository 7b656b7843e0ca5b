//! Pool statistics
//!
//! Monotonic counters the pool bumps on every lifecycle event. They are
//! diagnostic: concurrent bumps use relaxed ordering and small over- or
//! under-counts during races are acceptable.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counters describing a pool's history.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Raw connections opened over the pool's lifetime
    creations: AtomicI64,
    /// Raw connections actually closed (as opposed to returned)
    real_closeds: AtomicI64,
    /// Connections handed out to callers
    borrows: AtomicI64,
    /// Connections re-enqueued after use
    returns: AtomicI64,
    /// Connections discarded after a failed liveness check
    invalids: AtomicI64,
    /// Cumulative nanoseconds callers spent waiting to borrow
    borrow_sum_nanos: AtomicI64,
    /// Cumulative nanoseconds connections spent out with callers
    used_sum_nanos: AtomicI64,
}

impl PoolStats {
    /// Create a zeroed statistics block.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_creation(&self) {
        self.creations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_real_close(&self) {
        self.real_closeds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_borrow(&self) {
        self.borrows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_return(&self) {
        self.returns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid(&self) {
        self.invalids.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a borrow-wait duration; non-positive deltas are dropped.
    pub fn add_borrow_nanos(&self, nanos: i64) {
        if nanos > 0 {
            self.borrow_sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        }
    }

    /// Add an in-use duration; non-positive deltas are dropped.
    pub fn add_used_nanos(&self, nanos: i64) {
        if nanos > 0 {
            self.used_sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        }
    }

    pub fn creations(&self) -> i64 {
        self.creations.load(Ordering::Relaxed)
    }

    pub fn real_closeds(&self) -> i64 {
        self.real_closeds.load(Ordering::Relaxed)
    }

    pub fn borrows(&self) -> i64 {
        self.borrows.load(Ordering::Relaxed)
    }

    pub fn returns(&self) -> i64 {
        self.returns.load(Ordering::Relaxed)
    }

    pub fn invalids(&self) -> i64 {
        self.invalids.load(Ordering::Relaxed)
    }

    pub fn borrow_sum_nanos(&self) -> i64 {
        self.borrow_sum_nanos.load(Ordering::Relaxed)
    }

    pub fn used_sum_nanos(&self) -> i64 {
        self.used_sum_nanos.load(Ordering::Relaxed)
    }

    /// Reset any counter that has wrapped negative back to zero.
    ///
    /// A 64-bit counter going negative means it wrapped (or was misused);
    /// the maintenance task calls this each cycle so readers never see a
    /// negative total.
    pub fn fix_overflow(&self) {
        for counter in self.all() {
            if counter.load(Ordering::Relaxed) < 0 {
                counter.store(0, Ordering::Relaxed);
            }
        }
    }

    /// Zero every counter. Used by shutdown.
    pub fn reset_all(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Capture a point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            creations: self.creations(),
            real_closeds: self.real_closeds(),
            borrows: self.borrows(),
            returns: self.returns(),
            invalids: self.invalids(),
            borrow_sum_nanos: self.borrow_sum_nanos(),
            used_sum_nanos: self.used_sum_nanos(),
        }
    }

    fn all(&self) -> [&AtomicI64; 7] {
        [
            &self.creations,
            &self.real_closeds,
            &self.borrows,
            &self.returns,
            &self.invalids,
            &self.borrow_sum_nanos,
            &self.used_sum_nanos,
        ]
    }
}

/// A point-in-time copy of the pool counters, for metrics export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub creations: i64,
    pub real_closeds: i64,
    pub borrows: i64,
    pub returns: i64,
    pub invalids: i64,
    pub borrow_sum_nanos: i64,
    pub used_sum_nanos: i64,
}

impl StatsSnapshot {
    /// Cumulative borrow-wait time in milliseconds.
    pub fn borrow_sum_millis(&self) -> f64 {
        self.borrow_sum_nanos as f64 / 1_000_000.0
    }

    /// Cumulative in-use time in milliseconds.
    pub fn used_sum_millis(&self) -> f64 {
        self.used_sum_nanos as f64 / 1_000_000.0
    }
}
