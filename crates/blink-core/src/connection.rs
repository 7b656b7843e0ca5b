//! Raw connection trait

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// A raw database session as seen by the pool.
///
/// The pool never interprets SQL; it only needs a session to run a trivial
/// probe statement, answer a bounded liveness check, and close. Everything
/// else a driver exposes stays behind the driver's own connection type.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Driver identifier this session belongs to (e.g. "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Execute a statement, discarding any result.
    ///
    /// The pool uses this for configured SQL liveness probes; embedders may
    /// use it for arbitrary statements through the pooled handle.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Driver-native "is this session still alive?" check.
    ///
    /// Must answer within `timeout`; a probe that cannot complete in time
    /// counts as dead.
    async fn is_valid(&self, timeout: Duration) -> bool;

    /// Close the underlying session.
    async fn close(&self) -> Result<()>;

    /// Check if the session has already been closed.
    fn is_closed(&self) -> bool;
}
