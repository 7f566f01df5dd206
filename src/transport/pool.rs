//! Named connection pools.

use crate::cache::CopyOnWriteMap;
use crate::config::PoolConfig;
use crate::{Error, ErrorContext, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_POOL: &str = "default";

/// Connection-level settings reqwest fixes per connection pool. Clients of the
/// same pool with equal profiles share one `reqwest::Client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionProfile {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub follow_redirects: bool,
    pub follow_ssl_redirects: bool,
    pub ping_interval: Option<Duration>,
}

/// Idle-connection limits plus the pooled `reqwest::Client`s of every client
/// that names this pool.
pub struct ConnectionPool {
    pub name: String,
    pub max_idle_connections: usize,
    pub keep_alive: Duration,
    clients: CopyOnWriteMap<ConnectionProfile, reqwest::Client>,
}

impl ConnectionPool {
    pub fn new(name: impl Into<String>, config: &PoolConfig) -> Self {
        Self {
            name: name.into(),
            max_idle_connections: config.max_idle_connections,
            keep_alive: Duration::from_secs(config.keep_alive_second),
            clients: CopyOnWriteMap::new(),
        }
    }

    /// The pooled client for `profile`, built by `build` on first use.
    pub fn client_for<F>(&self, profile: ConnectionProfile, build: F) -> Result<reqwest::Client>
    where
        F: FnOnce(&ConnectionPool) -> Result<reqwest::Client>,
    {
        self.clients.get_or_try_insert_with(&profile, || {
            debug!(pool = %self.name, ?profile, "opening pooled http client");
            build(self)
        })
    }

    /// Number of distinct `reqwest::Client`s opened in this pool.
    pub fn open_clients(&self) -> usize {
        self.clients.len()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.name)
            .field("max_idle_connections", &self.max_idle_connections)
            .field("keep_alive", &self.keep_alive)
            .field("open_clients", &self.open_clients())
            .finish()
    }
}

/// Pools by name. There is always a `"default"` pool.
pub struct ConnectionPoolRegistry {
    pools: CopyOnWriteMap<String, Arc<ConnectionPool>>,
}

impl ConnectionPoolRegistry {
    pub fn from_config(pools: &HashMap<String, PoolConfig>) -> Result<Self> {
        let registry = Self {
            pools: CopyOnWriteMap::new(),
        };
        for (name, cfg) in pools {
            debug!(pool = %name, max_idle = cfg.max_idle_connections, "registering connection pool");
            registry.register(Arc::new(ConnectionPool::new(name.clone(), cfg)))?;
        }
        if !registry.pools.contains_key(&DEFAULT_POOL.to_string()) {
            registry.register(Arc::new(ConnectionPool::new(
                DEFAULT_POOL,
                &PoolConfig::default(),
            )))?;
        }
        Ok(registry)
    }

    pub fn register(&self, pool: Arc<ConnectionPool>) -> Result<()> {
        self.pools.insert(pool.name.clone(), pool)
    }

    pub fn get(&self, name: &str) -> Result<Arc<ConnectionPool>> {
        self.pools.get(&name.to_string()).ok_or_else(|| {
            Error::configuration_with_context(
                format!("no connection pool named '{}'", name),
                ErrorContext::new()
                    .with_field_path("pool_name")
                    .with_details(format!("known pools: {:?}", self.names()))
                    .with_source("connection_pool_registry"),
            )
        })
    }

    pub fn names(&self) -> Vec<String> {
        let mut names = self.pools.keys();
        names.sort();
        names
    }
}

impl Default for ConnectionPoolRegistry {
    fn default() -> Self {
        let mut pools = HashMap::new();
        pools.insert(DEFAULT_POOL.to_string(), PoolConfig::default());
        Self::from_config(&pools).unwrap_or_else(|_| Self {
            pools: CopyOnWriteMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_is_always_present() {
        let mut pools = HashMap::new();
        pools.insert(
            "heavy".to_string(),
            PoolConfig {
                max_idle_connections: 50,
                keep_alive_second: 60,
            },
        );
        let registry = ConnectionPoolRegistry::from_config(&pools).unwrap();
        assert_eq!(registry.names(), vec!["default", "heavy"]);
        assert_eq!(registry.get("heavy").unwrap().max_idle_connections, 50);
        assert_eq!(
            registry.get("default").unwrap().keep_alive,
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_unknown_pool_is_configuration_error() {
        let registry = ConnectionPoolRegistry::default();
        let err = registry.get("nope").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_same_name_returns_same_pool() {
        let registry = ConnectionPoolRegistry::default();
        let a = registry.get("default").unwrap();
        let b = registry.get("default").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
