//! Pool configuration
//!
//! All tunables the pool understands, with the validation and normalisation
//! pass that runs once at data-source construction. Zero means "use the
//! default" for every numeric field, values below a documented minimum clamp
//! up to that minimum, and negative values (except `check_interval_ms`,
//! where negative disables checking) are rejected.

#[cfg(test)]
mod tests;

use std::time::Duration;

use blink_core::{BlinkError, Result};
use serde::{Deserialize, Serialize};

/// Default pool name, used in logs and metrics.
pub const DEFAULT_POOL_NAME: &str = "blink-pool";

/// A simple probe statement for drivers without a native liveness check.
///
/// Only set [`BlinkConfig::check_sql`] when the driver's own liveness call
/// is unreliable; the native check is cheaper.
pub const SIMPLE_CHECK_SQL: &str = "SELECT 1";

/// Default minimum number of idle connections.
pub const DEFAULT_MIN_IDLE: i32 = 10;

/// Default ceiling on total connections (idle + borrowed).
pub const DEFAULT_MAX_POOL_SIZE: i32 = 20;

/// Smallest accepted idle timeout, in seconds.
pub const MIN_IDLE_TIMEOUT_SECS: i64 = 10;

/// Default idle timeout, in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 60;

/// Smallest accepted positive check interval, in milliseconds.
pub const MIN_CHECK_INTERVAL_MS: i64 = 500;

/// Default check interval, in milliseconds.
pub const DEFAULT_CHECK_INTERVAL_MS: i64 = 2_000;

/// Smallest accepted connection lifetime, in milliseconds.
pub const MIN_MAX_LIFETIME_MS: i64 = 60_000;

/// Default connection lifetime, in milliseconds.
pub const DEFAULT_MAX_LIFETIME_MS: i64 = 1_800_000;

/// Default liveness probe timeout, in seconds.
pub const DEFAULT_CHECK_TIMEOUT_SECS: i64 = 5;

/// Smallest accepted liveness probe timeout, in seconds.
pub const MIN_CHECK_TIMEOUT_SECS: i64 = 1;

/// Default borrow timeout, in milliseconds.
pub const DEFAULT_BORROW_TIMEOUT_MS: i64 = 30_000;

/// Configuration for a connection pool.
///
/// Immutable after [`BlinkConfig::validate_and_init`] runs; the pool only
/// ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlinkConfig {
    /// Pool identifier for logs and metrics
    pub pool_name: String,

    /// Connection URL; must begin with `jdbc:`
    pub url: String,

    /// Driver identifier; inferred from the URL scheme when unset
    pub driver: Option<String>,

    /// Username for the database session
    pub username: Option<String>,

    /// Password for the database session
    pub password: Option<String>,

    /// Floor on the idle connection count
    pub min_idle: i32,

    /// Hard ceiling on total connections, idle plus borrowed
    pub max_pool_size: i32,

    /// Seconds of pool-wide inactivity before extra idles are trimmed
    pub idle_timeout_secs: i64,

    /// Ceiling on any one connection's wall-clock age, in milliseconds.
    ///
    /// The actual per-connection deadline is randomised within
    /// `[0.8 * max_lifetime, max_lifetime)` so a cohort created together
    /// does not expire together.
    pub max_lifetime_ms: i64,

    /// Minimum milliseconds between liveness probes on one connection.
    ///
    /// Negative disables checking entirely, zero probes on every borrow,
    /// and positive values below 500 ms clamp up to 500 ms.
    pub check_interval_ms: i64,

    /// Seconds allowed for a single liveness probe
    pub check_timeout_secs: i64,

    /// Optional probe statement overriding the driver's native liveness call
    pub check_sql: Option<String>,

    /// Milliseconds a borrow may wait when the pool is saturated
    pub borrow_timeout_ms: i64,

    /// Whether to fill toward `min_idle` on a background task at construction
    pub async_init_idle: bool,
}

impl BlinkConfig {
    /// Create a configuration for the given URL with every tunable at its
    /// default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            pool_name: DEFAULT_POOL_NAME.to_string(),
            url: url.into(),
            driver: None,
            username: None,
            password: None,
            min_idle: DEFAULT_MIN_IDLE,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            max_lifetime_ms: DEFAULT_MAX_LIFETIME_MS,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
            check_sql: None,
            borrow_timeout_ms: DEFAULT_BORROW_TIMEOUT_MS,
            async_init_idle: false,
        }
    }

    /// Set the pool name.
    pub fn with_pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = name.into();
        self
    }

    /// Set the driver identifier explicitly, bypassing URL-scheme inference.
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the idle floor.
    pub fn with_min_idle(mut self, min_idle: i32) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set the total-connection ceiling.
    pub fn with_max_pool_size(mut self, max_pool_size: i32) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    /// Set the idle timeout in seconds.
    pub fn with_idle_timeout_secs(mut self, secs: i64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Set the maximum connection lifetime in milliseconds.
    pub fn with_max_lifetime_ms(mut self, ms: i64) -> Self {
        self.max_lifetime_ms = ms;
        self
    }

    /// Set the liveness check interval in milliseconds.
    pub fn with_check_interval_ms(mut self, ms: i64) -> Self {
        self.check_interval_ms = ms;
        self
    }

    /// Set the liveness probe timeout in seconds.
    pub fn with_check_timeout_secs(mut self, secs: i64) -> Self {
        self.check_timeout_secs = secs;
        self
    }

    /// Set a probe statement overriding the driver's native liveness call.
    pub fn with_check_sql(mut self, sql: impl Into<String>) -> Self {
        self.check_sql = Some(sql.into());
        self
    }

    /// Set the borrow timeout in milliseconds.
    pub fn with_borrow_timeout_ms(mut self, ms: i64) -> Self {
        self.borrow_timeout_ms = ms;
        self
    }

    /// Fill toward `min_idle` on a background task instead of inline.
    pub fn with_async_init_idle(mut self, async_init: bool) -> Self {
        self.async_init_idle = async_init;
        self
    }

    /// Validate the configuration and normalise every field in place.
    ///
    /// Fails when the URL is blank or not `jdbc:`-prefixed, when no driver
    /// can be inferred from the URL scheme and none was supplied, or when a
    /// numeric field is negative. Otherwise coerces zeroes to defaults and
    /// clamps below-minimum values up to their minima; a `min_idle` larger
    /// than `max_pool_size` swaps the two.
    pub fn validate_and_init(&mut self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(BlinkError::Config("the url parameter must not be blank".into()));
        }
        if self.pool_name.trim().is_empty() {
            self.pool_name = DEFAULT_POOL_NAME.to_string();
        }

        self.init_driver()?;
        self.init_pool_size()?;
        self.init_idle_timeout()?;
        self.init_max_lifetime()?;
        self.init_other_options()?;
        Ok(())
    }

    /// Resolved driver identifier.
    ///
    /// Only meaningful after [`BlinkConfig::validate_and_init`] has run.
    pub fn driver_id(&self) -> &str {
        self.driver.as_deref().unwrap_or_default()
    }

    /// Idle timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs as u64)
    }

    /// Maximum connection lifetime as a [`Duration`].
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_lifetime_ms as u64)
    }

    /// Liveness probe timeout as a [`Duration`].
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs as u64)
    }

    /// Borrow timeout as a [`Duration`].
    pub fn borrow_timeout(&self) -> Duration {
        Duration::from_millis(self.borrow_timeout_ms as u64)
    }

    fn init_driver(&mut self) -> Result<()> {
        if self.driver.as_deref().is_some_and(|d| !d.trim().is_empty()) {
            return Ok(());
        }

        if let Some(rest) = self.url.strip_prefix("jdbc:") {
            let scheme = rest.split(':').next().unwrap_or_default();
            self.driver = driver_id_for_scheme(scheme).map(str::to_string);
        } else {
            return Err(BlinkError::Config(format!(
                "the url parameter must begin with \"jdbc:\", got \"{}\"",
                self.url
            )));
        }

        match &self.driver {
            Some(_) => Ok(()),
            None => Err(BlinkError::Config(format!(
                "no driver is known for the url \"{}\"; set the driver parameter explicitly",
                self.url
            ))),
        }
    }

    fn init_pool_size(&mut self) -> Result<()> {
        if self.min_idle < 0 {
            return Err(BlinkError::Config(format!(
                "min_idle must not be negative, got {}",
                self.min_idle
            )));
        }
        if self.max_pool_size < 0 {
            return Err(BlinkError::Config(format!(
                "max_pool_size must not be negative, got {}",
                self.max_pool_size
            )));
        }
        if self.min_idle == 0 {
            self.min_idle = DEFAULT_MIN_IDLE;
        }
        if self.max_pool_size == 0 {
            self.max_pool_size = DEFAULT_MAX_POOL_SIZE;
        }

        if self.min_idle > self.max_pool_size {
            std::mem::swap(&mut self.min_idle, &mut self.max_pool_size);
            tracing::warn!(
                min_idle = self.min_idle,
                max_pool_size = self.max_pool_size,
                "min_idle was larger than max_pool_size; the two values were swapped"
            );
        }
        Ok(())
    }

    fn init_idle_timeout(&mut self) -> Result<()> {
        if self.idle_timeout_secs < 0 {
            return Err(BlinkError::Config(format!(
                "idle_timeout_secs must not be negative, got {}",
                self.idle_timeout_secs
            )));
        }
        if self.idle_timeout_secs == 0 {
            self.idle_timeout_secs = DEFAULT_IDLE_TIMEOUT_SECS;
        }
        self.idle_timeout_secs = self.idle_timeout_secs.max(MIN_IDLE_TIMEOUT_SECS);
        Ok(())
    }

    fn init_max_lifetime(&mut self) -> Result<()> {
        if self.max_lifetime_ms < 0 {
            return Err(BlinkError::Config(format!(
                "max_lifetime_ms must not be negative, got {}",
                self.max_lifetime_ms
            )));
        }
        if self.max_lifetime_ms == 0 {
            self.max_lifetime_ms = DEFAULT_MAX_LIFETIME_MS;
        }
        self.max_lifetime_ms = self.max_lifetime_ms.max(MIN_MAX_LIFETIME_MS);
        Ok(())
    }

    fn init_other_options(&mut self) -> Result<()> {
        // Negative disables checking and zero forces a probe on every
        // borrow; both pass through untouched.
        if self.check_interval_ms > 0 && self.check_interval_ms < MIN_CHECK_INTERVAL_MS {
            self.check_interval_ms = MIN_CHECK_INTERVAL_MS;
        }

        if self.check_timeout_secs < 0 {
            return Err(BlinkError::Config(format!(
                "check_timeout_secs must not be negative, got {}",
                self.check_timeout_secs
            )));
        }
        if self.check_timeout_secs == 0 {
            self.check_timeout_secs = DEFAULT_CHECK_TIMEOUT_SECS;
        }
        self.check_timeout_secs = self.check_timeout_secs.max(MIN_CHECK_TIMEOUT_SECS);

        if self.borrow_timeout_ms < 0 {
            return Err(BlinkError::Config(format!(
                "borrow_timeout_ms must not be negative, got {}",
                self.borrow_timeout_ms
            )));
        }
        if self.borrow_timeout_ms == 0 {
            self.borrow_timeout_ms = DEFAULT_BORROW_TIMEOUT_MS;
        }
        Ok(())
    }
}

/// Map a URL scheme to the registry identifier of its driver.
///
/// Covers the mainstream databases; anything else needs an explicit
/// `driver` setting.
fn driver_id_for_scheme(scheme: &str) -> Option<&'static str> {
    match scheme {
        "postgresql" => Some("postgresql"),
        "mysql" => Some("mysql"),
        "hsqldb" => Some("hsqldb"),
        "h2" => Some("h2"),
        "oracle" => Some("oracle"),
        "sqlserver" => Some("sqlserver"),
        "sybase" => Some("sybase"),
        "db2" => Some("db2"),
        "jtds" => Some("jtds"),
        "kingbase8" => Some("kingbase8"),
        "uxdb" => Some("uxdb"),
        "dm" => Some("dm"),
        "informix-sqli" => Some("informix-sqli"),
        "log4jdbc" => Some("log4jdbc"),
        _ => None,
    }
}
