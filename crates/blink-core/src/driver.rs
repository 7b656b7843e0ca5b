//! Database driver trait and registry


use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{Connection, Result};

/// Options handed to a driver when opening a new session
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Connection URL, passed through to the driver verbatim
    pub url: String,
    /// Username, if the driver requires one
    pub username: Option<String>,
    /// Password, if the driver requires one
    pub password: Option<String>,
}

impl ConnectOptions {
    /// Create options for the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
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
}

/// Factory for raw database sessions.
///
/// The pool treats drivers as opaque: `open` either yields a live session or
/// an error. Liveness checking and closing happen on the returned
/// [`Connection`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Unique identifier for this driver (e.g. "postgresql", "h2")
    fn id(&self) -> &'static str;

    /// Open a new raw session.
    async fn open(&self, opts: &ConnectOptions) -> Result<Arc<dyn Connection>>;
}

/// Registry of available drivers, keyed by driver identifier.
///
/// A pool resolves its configured driver id here at construction time, so a
/// missing driver surfaces as a configuration error before any connection is
/// attempted.
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            drivers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a driver under its own id, replacing any previous entry.
    pub fn register(&self, driver: Arc<dyn Driver>) {
        self.drivers.write().insert(driver.id().to_string(), driver);
    }

    /// Look up a driver by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.read().get(id).cloned()
    }

    /// Check whether a driver id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.drivers.read().contains_key(id)
    }

    /// Ids of all registered drivers.
    pub fn ids(&self) -> Vec<String> {
        self.drivers.read().keys().cloned().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
