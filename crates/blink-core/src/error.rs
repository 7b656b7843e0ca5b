//! Error types for blink-pool

use std::time::Duration;

use thiserror::Error;

/// Core error type for pool operations
#[derive(Error, Debug)]
pub enum BlinkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to open a database connection: {0}")]
    Connect(String),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("the connection pool is closed")]
    PoolClosed,

    #[error(
        "timed out after {0:?} waiting to borrow a connection; consider raising max_pool_size or fixing slow queries"
    )]
    BorrowTimeout(Duration),

    #[error("interrupted while waiting to borrow a connection")]
    Interrupted,
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, BlinkError>;
