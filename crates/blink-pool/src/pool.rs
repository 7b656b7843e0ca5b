//! The connection pool
//!
//! A bounded idle queue of already-opened connections plus the borrow/return
//! protocol around it. Borrowers take from the queue (waiting a bounded time
//! when it is empty), liveness-check what they get, and hand connections
//! back by closing the [`PooledConnection`] handle. A single maintenance
//! task keeps the idle population between `min_idle` and `max_pool_size`.

mod conn;
mod pool;
mod queue;
mod stats;


pub use conn::PooledConnection;
pub use stats::{PoolStats, StatsSnapshot};

pub(crate) use pool::BlinkPool;
