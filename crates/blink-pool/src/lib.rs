//! Blink Pool - A lightweight, high-performance database connection pool
//!
//! The pool keeps a bounded population of already-opened connections, hands
//! them out on demand, and reclaims them when callers are done. Closing a
//! borrowed handle returns the session to the pool instead of tearing it
//! down.
//!
//! # Example
//!
//! ```ignore
//! use blink_pool::{BlinkConfig, BlinkDataSource};
//!
//! let config = BlinkConfig::new("jdbc:postgresql://localhost:5432/app")
//!     .with_username("app")
//!     .with_password("secret")
//!     .with_min_idle(5)
//!     .with_max_pool_size(20);
//!
//! let ds = BlinkDataSource::new(config, &registry).await?;
//! let conn = ds.get_connection().await?;
//! conn.execute("SELECT 1").await?;
//! conn.close().await; // back to the pool, not really closed
//! ```

pub mod config;
mod datasource;
pub mod pool;

pub use config::{BlinkConfig, DEFAULT_POOL_NAME, SIMPLE_CHECK_SQL};
pub use datasource::BlinkDataSource;
pub use pool::{PoolStats, PooledConnection, StatsSnapshot};

pub use blink_core::{BlinkError, ConnectOptions, Connection, Driver, DriverRegistry, Result};
