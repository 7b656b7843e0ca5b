//! Bounded FIFO of idle connections

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::{Duration, Instant};

use super::conn::PooledEntry;

/// Why a bounded-wait take came back empty-handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TakeError {
    /// The timeout elapsed with nothing available
    TimedOut,
    /// The queue was closed while waiting (pool shutdown)
    Closed,
}

/// The idle queue: a capacity-bounded FIFO that supports a non-blocking
/// take, a bounded-wait take, and a non-blocking offer.
///
/// The semaphore's permit count always equals the deque length, so waiters
/// park on `acquire` instead of polling. Capacity is a safety net; the pool
/// enforces the real population bound by re-checking queue length plus
/// borrow count before every creation.
pub(crate) struct IdleQueue {
    entries: Mutex<VecDeque<PooledEntry>>,
    available: Semaphore,
    capacity: usize,
}

impl IdleQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Semaphore::new(0),
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Take the oldest idle entry without waiting.
    pub(crate) fn try_take(&self) -> Option<PooledEntry> {
        match self.available.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.entries.lock().pop_front()
            }
            Err(_) => None,
        }
    }

    /// Take the oldest idle entry, waiting up to `timeout` for one to appear.
    pub(crate) async fn take(&self, timeout: Duration) -> Result<PooledEntry, TakeError> {
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.available.acquire()).await {
                Err(_) => return Err(TakeError::TimedOut),
                Ok(Err(_)) => return Err(TakeError::Closed),
                Ok(Ok(permit)) => {
                    permit.forget();
                    if let Some(entry) = self.entries.lock().pop_front() {
                        return Ok(entry);
                    }
                    // Raced with a shutdown drain; keep waiting out the deadline.
                }
            }
        }
    }

    /// Enqueue an entry, handing it back if the queue is at capacity.
    pub(crate) fn offer(&self, entry: PooledEntry) -> Result<(), PooledEntry> {
        {
            let mut entries = self.entries.lock();
            if entries.len() >= self.capacity {
                return Err(entry);
            }
            entries.push_back(entry);
        }
        self.available.add_permits(1);
        Ok(())
    }

    /// Remove and return every entry. Shutdown only.
    pub(crate) fn drain(&self) -> Vec<PooledEntry> {
        self.entries.lock().drain(..).collect()
    }

    /// Close the queue, waking every blocked taker with [`TakeError::Closed`].
    pub(crate) fn close(&self) {
        self.available.close();
    }
}
