//! PostgreSQL pool shared by the document, cache, job and domain repositories.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use mnemos_core::{defaults, Error, Result};

/// Pool sizing and connection lifetimes.
///
/// An ingestion job stores documents one at a time and the cache writes hits
/// back on spawned tasks, so a handful of connections covers a sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Upper bound on open connections. Never below `min_connections`.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long a caller waits for a free connection.
    pub acquire_timeout: Duration,
    /// Idle connections above the minimum close after this long.
    pub idle_timeout: Duration,
    /// Connections are recycled after this long; `None` keeps them.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: defaults::DB_MAX_CONNECTIONS,
            min_connections: defaults::DB_MIN_CONNECTIONS,
            acquire_timeout: Duration::from_secs(defaults::DB_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(defaults::DB_IDLE_TIMEOUT_SECS),
            max_lifetime: lifetime(defaults::DB_MAX_LIFETIME_SECS),
        }
    }
}

fn lifetime(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl PoolConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DB_MAX_CONNECTIONS` | `10` | Pool size limit |
    /// | `DB_MIN_CONNECTIONS` | `1` | Idle connections kept open |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `30` | Wait for a free connection |
    /// | `DB_IDLE_TIMEOUT_SECS` | `600` | Idle connection lifetime |
    /// | `DB_MAX_LIFETIME_SECS` | `1800` | Connection recycling, `0` disables |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let secs = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
        let count = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u32>().ok());

        Self {
            max_connections: d.max_connections,
            min_connections: d.min_connections,
            acquire_timeout: secs("DB_ACQUIRE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.acquire_timeout),
            idle_timeout: secs("DB_IDLE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.idle_timeout),
            max_lifetime: secs("DB_MAX_LIFETIME_SECS")
                .map(lifetime)
                .unwrap_or(d.max_lifetime),
        }
        .with_connections(
            count("DB_MIN_CONNECTIONS").unwrap_or(d.min_connections),
            count("DB_MAX_CONNECTIONS").unwrap_or(d.max_connections),
        )
    }

    /// Set the pool bounds. `max` is raised to at least one and to `min`.
    pub fn with_connections(mut self, min: u32, max: u32) -> Self {
        self.min_connections = min;
        self.max_connections = max.max(min).max(1);
        self
    }

    /// Set how long a caller waits for a free connection.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the idle timeout for connections above the minimum.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the recycling age; `None` keeps connections until they fail.
    pub fn with_max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

/// Open a pool against `database_url`.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout);
    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(max_lifetime);
    }

    let pool = options
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_follow_constants() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, defaults::DB_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, defaults::DB_MIN_CONNECTIONS);
        assert_eq!(config.max_lifetime, Some(Duration::from_secs(1800)));
        assert_eq!(PoolConfig::from_lookup(lookup(&[])), config);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DB_MAX_CONNECTIONS", "4"),
            ("DB_ACQUIRE_TIMEOUT_SECS", " 5 "),
            ("DB_MAX_LIFETIME_SECS", "0"),
            ("DB_IDLE_TIMEOUT_SECS", "soon"),
        ]));
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert!(config.max_lifetime.is_none());
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_max_never_below_min() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("DB_MIN_CONNECTIONS", "8"),
            ("DB_MAX_CONNECTIONS", "2"),
        ]));
        assert_eq!(config.min_connections, 8);
        assert_eq!(config.max_connections, 8);
        assert_eq!(PoolConfig::default().with_connections(0, 0).max_connections, 1);
    }
}
