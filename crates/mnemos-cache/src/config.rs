//! Cache configuration.

use std::time::Duration;

use mnemos_core::defaults;

/// Tunables of a [`CacheService`](crate::CacheService).
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Capacity of the memory tier in entries.
    pub max_entries: usize,
    /// TTL applied when a write does not set one.
    pub default_ttl: Duration,
    /// Serialized values larger than this many bytes are gzip-compressed.
    pub compression_threshold: usize,
    /// Period of the expired-entry sweep.
    pub cleanup_interval: Duration,
    /// Period of the memory usage monitor.
    pub monitor_interval: Duration,
    /// Memory tier size above which the monitor warns.
    pub memory_warn_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: defaults::CACHE_MAX_ENTRIES,
            default_ttl: Duration::from_secs(defaults::CACHE_TTL_SECS),
            compression_threshold: defaults::CACHE_COMPRESSION_THRESHOLD,
            cleanup_interval: Duration::from_secs(defaults::CACHE_CLEANUP_INTERVAL_SECS),
            monitor_interval: Duration::from_secs(defaults::CACHE_MONITOR_INTERVAL_SECS),
            memory_warn_bytes: defaults::CACHE_MEMORY_WARN_BYTES,
        }
    }
}

impl CacheConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads:
    /// - `CACHE_MAX_ENTRIES` (default: 1000)
    /// - `CACHE_DEFAULT_TTL_SECS` (default: 3600)
    /// - `CACHE_COMPRESSION_THRESHOLD` (default: 1024 bytes)
    /// - `CACHE_CLEANUP_INTERVAL_SECS` (default: 900)
    /// - `CACHE_MONITOR_INTERVAL_SECS` (default: 300)
    /// - `CACHE_MEMORY_WARN_BYTES` (default: 100 MiB)
    pub fn from_env() -> Self {
        let fallback = Self::default();
        let secs = |name: &str, default: Duration| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let count = |name: &str, default: usize| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(default)
        };

        Self {
            max_entries: count("CACHE_MAX_ENTRIES", fallback.max_entries).max(1),
            default_ttl: secs("CACHE_DEFAULT_TTL_SECS", fallback.default_ttl),
            compression_threshold: count(
                "CACHE_COMPRESSION_THRESHOLD",
                fallback.compression_threshold,
            ),
            cleanup_interval: secs("CACHE_CLEANUP_INTERVAL_SECS", fallback.cleanup_interval),
            monitor_interval: secs("CACHE_MONITOR_INTERVAL_SECS", fallback.monitor_interval),
            memory_warn_bytes: count("CACHE_MEMORY_WARN_BYTES", fallback.memory_warn_bytes),
        }
    }

    /// Set the local tier capacity (at least one).
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Set the TTL of writes without their own.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the serialized size above which values are compressed.
    pub fn with_compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    /// Set the expired-entry sweep and the stats monitor intervals.
    pub fn with_maintenance(mut self, cleanup: Duration, monitor: Duration) -> Self {
        self.cleanup_interval = cleanup;
        self.monitor_interval = monitor;
        self
    }

    /// Set the local tier size that triggers a memory warning.
    pub fn with_memory_warn_bytes(mut self, bytes: usize) -> Self {
        self.memory_warn_bytes = bytes;
        self
    }
}
