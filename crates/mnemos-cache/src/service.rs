//! Two-tier cache: a bounded LRU memory tier in front of an optional
//! persistent [`CacheRepository`].
//!
//! ## Read path
//!
//! `get` checks memory first, then the persistent tier, promoting a
//! persistent hit into memory. Expired entries are deleted from both tiers
//! and reported as a miss. Persistent-tier failures on reads are logged and
//! counted, never returned.
//!
//! ## Write path
//!
//! `set` serializes to JSON, gzip-compresses values above the compression
//! threshold, and writes both tiers. Bulk invalidation (`clear_namespace`,
//! `clear_by_tags`, `invalidate_pattern`) always covers both tiers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt};
use lru::LruCache;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use mnemos_core::{
    defaults, CacheEntry, CacheRepository, CacheStats, Error, NamespaceStats, Result,
};

use crate::compression;
use crate::config::CacheConfig;

/// Per-write options. Unset fields fall back to [`CacheConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub namespace: Option<String>,
    pub tags: Vec<String>,
    pub compression_threshold: Option<usize>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the configured TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Write into `namespace` instead of `"default"`.
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Tags for [`CacheService::clear_by_tags`].
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Override the configured compression threshold.
    pub fn with_compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = Some(bytes);
        self
    }

    /// Namespace of the write, `"default"` when unset.
    pub fn namespace(&self) -> &str {
        self.namespace
            .as_deref()
            .unwrap_or(defaults::CACHE_NAMESPACE)
    }
}

/// One producer handed to [`CacheService::warm_cache`].
pub struct WarmEntry<'a> {
    pub key: String,
    producer: BoxFuture<'a, Result<JsonValue>>,
    pub options: SetOptions,
}

impl<'a> WarmEntry<'a> {
    /// Warm `key` with the value `producer` resolves to.
    pub fn new<T, Fut>(key: impl Into<String>, producer: Fut) -> Self
    where
        T: Serialize + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        let producer = async move {
            let value = producer.await?;
            Ok(serde_json::to_value(value)?)
        }
        .boxed();
        Self {
            key: key.into(),
            producer,
            options: SetOptions::default(),
        }
    }

    /// Options applied to the warmed write.
    pub fn with_options(mut self, options: SetOptions) -> Self {
        self.options = options;
        self
    }
}

/// A warmer that failed, with its error message.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of [`CacheService::warm_cache`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarmReport {
    pub warmed: Vec<String>,
    pub failed: Vec<WarmFailure>,
}

/// Entries removed by one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub memory: usize,
    pub persistent: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct LookupCounters {
    hits: u64,
    misses: u64,
    errors: u64,
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Hit,
    Miss,
    Error,
}

enum MemoryLookup {
    Hit(CacheEntry),
    Expired,
    Absent,
}

/// Wall time that advances with the tokio clock.
#[derive(Debug, Clone, Copy)]
struct Clock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

/// Two-tier cache service.
///
/// Cloning is cheap and every clone shares the same tiers and counters.
#[derive(Clone)]
pub struct CacheService {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    memory: Mutex<LruCache<String, CacheEntry>>,
    persistent: Option<Arc<dyn CacheRepository>>,
    counters: StdMutex<HashMap<String, LookupCounters>>,
    config: CacheConfig,
    clock: Clock,
}

impl CacheService {
    /// Create a cache, optionally backed by a persistent tier.
    pub fn new(config: CacheConfig, persistent: Option<Arc<dyn CacheRepository>>) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        info!(
            subsystem = "cache",
            component = "cache_service",
            max_entries = capacity.get(),
            default_ttl_secs = config.default_ttl.as_secs(),
            persistent = persistent.is_some(),
            "Cache service initialized"
        );
        Self {
            inner: Arc::new(CacheInner {
                memory: Mutex::new(LruCache::new(capacity)),
                persistent,
                counters: StdMutex::new(HashMap::new()),
                config,
                clock: Clock::start(),
            }),
        }
    }

    /// Memory tier only.
    pub fn memory_only(config: CacheConfig) -> Self {
        Self::new(config, None)
    }

    /// Configuration from the environment, see [`CacheConfig::from_env`].
    pub fn from_env(persistent: Option<Arc<dyn CacheRepository>>) -> Self {
        Self::new(CacheConfig::from_env(), persistent)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Look up `key` in `namespace`.
    ///
    /// Returns `None` on a miss, an expired entry, a persistent-tier failure
    /// or a value that does not deserialize as `T`.
    #[instrument(skip(self), fields(subsystem = "cache", component = "cache_service", op = "get"))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str, namespace: &str) -> Option<T> {
        if let Err(e) = check_namespace(namespace) {
            warn!(namespace, error = %e, "Cache lookup in an invalid namespace");
            return None;
        }
        let full_key = CacheEntry::full_key(namespace, key);
        let Some(entry) = self.lookup(&full_key, namespace).await else {
            self.count(namespace, Lookup::Miss);
            debug!(cache_key = %full_key, "Cache miss");
            return None;
        };

        match decode::<T>(&entry) {
            Ok(value) => {
                self.count(namespace, Lookup::Hit);
                debug!(cache_key = %full_key, hit_count = entry.hit_count, "Cache hit");
                Some(value)
            }
            Err(e) => {
                self.count(namespace, Lookup::Error);
                warn!(cache_key = %full_key, error = %e, "Cached value could not be decoded");
                None
            }
        }
    }

    /// Whether `key` currently sits in the memory tier. Does not touch LRU order.
    pub async fn is_resident(&self, key: &str, namespace: &str) -> bool {
        if check_namespace(namespace).is_err() {
            return false;
        }
        let full_key = CacheEntry::full_key(namespace, key);
        self.inner.memory.lock().await.contains(&full_key)
    }

    async fn lookup(&self, full_key: &str, namespace: &str) -> Option<CacheEntry> {
        let now = self.now();
        let found = {
            let mut memory = self.inner.memory.lock().await;
            let state = match memory.get_mut(full_key) {
                Some(entry) if entry.is_expired(now) => MemoryLookup::Expired,
                Some(entry) => {
                    entry.touch(now);
                    MemoryLookup::Hit(entry.clone())
                }
                None => MemoryLookup::Absent,
            };
            if matches!(state, MemoryLookup::Expired) {
                memory.pop(full_key);
            }
            state
        };

        match found {
            MemoryLookup::Hit(entry) => {
                self.spawn_record_hit(full_key, now);
                Some(entry)
            }
            MemoryLookup::Expired => {
                debug!(cache_key = %full_key, "Cache entry expired");
                self.delete_persistent(full_key, namespace).await;
                None
            }
            MemoryLookup::Absent => self.load_persistent(full_key, namespace, now).await,
        }
    }

    async fn load_persistent(
        &self,
        full_key: &str,
        namespace: &str,
        now: DateTime<Utc>,
    ) -> Option<CacheEntry> {
        let repo = self.inner.persistent.as_ref()?;
        match repo.get(full_key).await {
            Ok(Some(entry)) if entry.is_expired(now) => {
                debug!(cache_key = %full_key, "Persistent cache entry expired");
                self.delete_persistent(full_key, namespace).await;
                None
            }
            Ok(Some(mut entry)) => {
                entry.touch(now);
                self.admit(entry.clone()).await;
                self.spawn_record_hit(full_key, now);
                Some(entry)
            }
            Ok(None) => None,
            Err(e) => {
                self.count(namespace, Lookup::Error);
                warn!(cache_key = %full_key, error = %e, "Persistent cache read failed");
                None
            }
        }
    }

    async fn delete_persistent(&self, full_key: &str, namespace: &str) {
        if let Some(repo) = &self.inner.persistent {
            if let Err(e) = repo.delete(full_key).await {
                self.count(namespace, Lookup::Error);
                warn!(cache_key = %full_key, error = %e, "Persistent cache delete failed");
            }
        }
    }

    fn spawn_record_hit(&self, full_key: &str, at: DateTime<Utc>) {
        let Some(repo) = self.inner.persistent.clone() else {
            return;
        };
        let key = full_key.to_string();
        tokio::spawn(async move {
            if let Err(e) = repo.record_hit(&key, at).await {
                debug!(cache_key = %key, error = %e, "Persistent hit update failed");
            }
        });
    }

    /// Insert into the memory tier, evicting the least recently used entry at capacity.
    async fn admit(&self, entry: CacheEntry) {
        let key = entry.key.clone();
        let evicted = self.inner.memory.lock().await.push(key.clone(), entry);
        if let Some((evicted_key, _)) = evicted.filter(|(k, _)| *k != key) {
            debug!(cache_key = %evicted_key, "Evicted least recently used entry");
        }
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Store `value` under `key`, in memory and in the persistent tier.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty key or a zero TTL
    /// - `Serialization` if `value` cannot be serialized
    /// - the persistent tier's error if its write fails (the memory tier
    ///   still holds the value)
    #[instrument(
        skip(self, value, options),
        fields(subsystem = "cache", component = "cache_service", op = "set", namespace = %options.namespace())
    )]
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: &SetOptions,
    ) -> Result<()> {
        let entry = self.build_entry(key, value, options)?;
        let namespace = entry.namespace.clone();
        debug!(
            cache_key = %entry.key,
            size_bytes = entry.size,
            original_size = entry.original_size,
            compressed = entry.compressed,
            "Cache set"
        );

        self.admit(entry.clone()).await;

        if let Some(repo) = &self.inner.persistent {
            if let Err(e) = repo.put(&entry).await {
                self.count(&namespace, Lookup::Error);
                error!(cache_key = %entry.key, error = %e, "Persistent cache write failed");
                return Err(e);
            }
        }
        Ok(())
    }

    fn build_entry<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: &SetOptions,
    ) -> Result<CacheEntry> {
        if key.is_empty() {
            return Err(Error::InvalidInput("Cache key must not be empty".to_string()));
        }
        check_namespace(options.namespace())?;
        let ttl = options.ttl.unwrap_or(self.inner.config.default_ttl);
        if ttl.is_zero() {
            return Err(Error::InvalidInput("Cache TTL must be positive".to_string()));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| Error::InvalidInput(format!("Cache TTL out of range: {:?}", ttl)))?;

        let serialized = serde_json::to_vec(value)?;
        let original_size = serialized.len();
        let threshold = options
            .compression_threshold
            .unwrap_or(self.inner.config.compression_threshold);
        let compressed = compression::should_compress(original_size, threshold);
        let value = if compressed {
            compression::compress(&serialized)?
        } else {
            serialized
        };

        let namespace = options.namespace();
        let now = self.now();
        Ok(CacheEntry {
            key: CacheEntry::full_key(namespace, key),
            namespace: namespace.to_string(),
            size: value.len(),
            value,
            compressed,
            original_size,
            tags: options.tags.clone(),
            created_at: now,
            expires_at: now + ttl,
            hit_count: 0,
            last_hit: now,
        })
    }

    /// Cache-aside read: return the cached value or compute, store and return it.
    ///
    /// A failed write of the computed value is logged and the value is still
    /// returned. Errors of `fallback` propagate.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        fallback: F,
        options: &SetOptions,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        check_namespace(options.namespace())?;
        if let Some(cached) = self.get::<T>(key, options.namespace()).await {
            return Ok(cached);
        }

        let value = fallback().await?;
        if let Err(e) = self.set(key, &value, options).await {
            warn!(
                subsystem = "cache",
                cache_key = %CacheEntry::full_key(options.namespace(), key),
                error = %e,
                "Computed value was not cached"
            );
        }
        Ok(value)
    }

    /// Run every producer concurrently and cache each success in `namespace`.
    ///
    /// A failing producer or write is reported in [`WarmReport::failed`] and
    /// never affects the others.
    #[instrument(skip(self, entries), fields(subsystem = "cache", op = "warm", entry_count = entries.len()))]
    pub async fn warm_cache(&self, namespace: &str, entries: Vec<WarmEntry<'_>>) -> WarmReport {
        info!(namespace, "Starting cache warming");

        let outcomes = join_all(entries.into_iter().map(|entry| async move {
            let WarmEntry {
                key,
                producer,
                options,
            } = entry;
            let options = options.in_namespace(namespace);
            let outcome = match producer.await {
                Ok(value) => self.set(&key, &value, &options).await,
                Err(e) => Err(e),
            };
            (key, outcome)
        }))
        .await;

        let mut report = WarmReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    debug!(namespace, key = %key, "Warmed cache key");
                    report.warmed.push(key);
                }
                Err(e) => {
                    error!(namespace, key = %key, error = %e, "Failed to warm cache key");
                    report.failed.push(WarmFailure {
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            namespace,
            warmed = report.warmed.len(),
            failed = report.failed.len(),
            "Cache warming completed"
        );
        report
    }

    // =========================================================================
    // INVALIDATION
    // =========================================================================

    /// Remove one key from both tiers. Returns whether either tier held it.
    pub async fn delete(&self, key: &str, namespace: &str) -> Result<bool> {
        check_namespace(namespace)?;
        let full_key = CacheEntry::full_key(namespace, key);
        let in_memory = self.inner.memory.lock().await.pop(&full_key).is_some();
        let persisted = match &self.inner.persistent {
            Some(repo) => repo.delete(&full_key).await?,
            None => false,
        };
        debug!(subsystem = "cache", cache_key = %full_key, in_memory, persisted, "Cache delete");
        Ok(in_memory || persisted)
    }

    /// Remove every entry of `namespace`. Returns the number of distinct keys removed.
    pub async fn clear_namespace(&self, namespace: &str) -> Result<usize> {
        check_namespace(namespace)?;
        let mut removed: HashSet<String> = self
            .evict_memory(|entry| entry.namespace == namespace)
            .await
            .into_iter()
            .collect();
        if let Some(repo) = &self.inner.persistent {
            removed.extend(repo.delete_namespace(namespace).await?);
        }

        info!(subsystem = "cache", namespace, removed = removed.len(), "Cleared cache namespace");
        Ok(removed.len())
    }

    /// Remove every entry carrying any of `tags`.
    pub async fn clear_by_tags(&self, tags: &[String]) -> Result<usize> {
        if tags.is_empty() {
            return Ok(0);
        }
        let mut removed: HashSet<String> = self
            .evict_memory(|entry| entry.tags.iter().any(|t| tags.contains(t)))
            .await
            .into_iter()
            .collect();
        if let Some(repo) = &self.inner.persistent {
            removed.extend(repo.delete_by_tags(tags).await?);
        }

        info!(subsystem = "cache", ?tags, removed = removed.len(), "Cleared cache by tags");
        Ok(removed.len())
    }

    /// Remove entries whose key matches the regular expression `pattern`.
    ///
    /// With a namespace, the pattern is matched against keys without their
    /// namespace prefix and only that namespace is scanned; without one, it
    /// is matched against fully qualified keys.
    pub async fn invalidate_pattern(&self, pattern: &str, namespace: Option<&str>) -> Result<usize> {
        if let Some(ns) = namespace {
            check_namespace(ns)?;
        }
        let regex = Regex::new(pattern).map_err(|e| {
            Error::InvalidInput(format!("Invalid cache key pattern '{}': {}", pattern, e))
        })?;

        let mut removed: HashSet<String> = self
            .evict_memory(|entry| {
                namespace.map_or(true, |ns| entry.namespace == ns)
                    && key_matches(&regex, &entry.key, namespace)
            })
            .await
            .into_iter()
            .collect();

        if let Some(repo) = &self.inner.persistent {
            let matching: Vec<String> = repo
                .list_keys(namespace)
                .await?
                .into_iter()
                .filter(|key| key_matches(&regex, key, namespace))
                .collect();
            if !matching.is_empty() {
                repo.delete_many(&matching).await?;
            }
            removed.extend(matching);
        }

        info!(
            subsystem = "cache",
            pattern,
            namespace = namespace.unwrap_or("*"),
            removed = removed.len(),
            "Invalidated cache entries matching pattern"
        );
        Ok(removed.len())
    }

    async fn evict_memory<F>(&self, matches: F) -> Vec<String>
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let mut memory = self.inner.memory.lock().await;
        let keys: Vec<String> = memory
            .iter()
            .filter(|(_, entry)| matches(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            memory.pop(key);
        }
        keys
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Delete expired entries from both tiers.
    ///
    /// A persistent-tier failure is logged and reported as zero removals.
    pub async fn sweep_expired(&self) -> SweepReport {
        let now = self.now();
        let memory = self.evict_memory(|entry| entry.is_expired(now)).await.len();
        let persistent = match &self.inner.persistent {
            Some(repo) => match repo.delete_expired(now).await {
                Ok(removed) => removed,
                Err(e) => {
                    error!(subsystem = "cache", op = "sweep", error = %e, "Persistent cache cleanup failed");
                    0
                }
            },
            None => 0,
        };

        if memory > 0 || persistent > 0 {
            info!(subsystem = "cache", op = "sweep", memory, persistent, "Cleaned up expired cache entries");
        }
        SweepReport { memory, persistent }
    }

    /// Stored bytes held by the memory tier.
    pub async fn memory_usage(&self) -> usize {
        self.inner
            .memory
            .lock()
            .await
            .iter()
            .map(|(_, entry)| entry.size)
            .sum()
    }

    /// Log memory tier usage, warning above the configured limit.
    pub async fn check_memory_usage(&self) -> usize {
        let (entries, total) = {
            let memory = self.inner.memory.lock().await;
            let total: usize = memory.iter().map(|(_, entry)| entry.size).sum();
            (memory.len(), total)
        };
        let avg = if entries > 0 { total / entries } else { 0 };
        debug!(
            subsystem = "cache",
            op = "monitor",
            entries,
            size_bytes = total,
            avg_entry_bytes = avg,
            "Cache memory usage"
        );
        if total > self.inner.config.memory_warn_bytes {
            warn!(
                subsystem = "cache",
                op = "monitor",
                size_bytes = total,
                limit_bytes = self.inner.config.memory_warn_bytes,
                "Cache memory usage is high"
            );
        }
        total
    }

    /// Spawn the periodic expiry sweep and memory monitor.
    ///
    /// The timers run until [`MaintenanceHandle::stop`] is called or the
    /// handle is dropped.
    pub fn start_maintenance(&self) -> MaintenanceHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let cache = self.clone();
        let task = tokio::spawn(async move {
            cache.run_maintenance(&mut shutdown_rx).await;
        });

        info!(
            subsystem = "cache",
            cleanup_interval_secs = self.inner.config.cleanup_interval.as_secs(),
            monitor_interval_secs = self.inner.config.monitor_interval.as_secs(),
            "Cache maintenance tasks started"
        );
        MaintenanceHandle { shutdown_tx, task }
    }

    async fn run_maintenance(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        let floor = Duration::from_millis(1);
        let mut cleanup = tokio::time::interval(self.inner.config.cleanup_interval.max(floor));
        let mut monitor = tokio::time::interval(self.inner.config.monitor_interval.max(floor));
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        monitor.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First tick of an interval fires immediately.
        cleanup.tick().await;
        monitor.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "cache", "Cache maintenance stopped");
                    break;
                }
                _ = cleanup.tick() => {
                    self.sweep_expired().await;
                }
                _ = monitor.tick() => {
                    self.check_memory_usage().await;
                }
            }
        }
    }

    // =========================================================================
    // STATS
    // =========================================================================

    /// Statistics of the memory tier plus the lookup counters.
    ///
    /// Entries held only by the persistent tier are not counted.
    pub async fn get_stats(&self) -> CacheStats {
        let now = self.now();
        let mut by_namespace: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        let mut stats = CacheStats::default();
        let mut total_hit_count = 0u64;
        let mut ratios = Vec::new();

        {
            let memory = self.inner.memory.lock().await;
            for (_, entry) in memory.iter() {
                stats.total_entries += 1;
                stats.total_size += entry.size;
                total_hit_count += entry.hit_count;
                if entry.is_expired(now) {
                    stats.expired_entries += 1;
                }
                if entry.compressed && entry.original_size > 0 {
                    ratios.push(entry.size as f64 / entry.original_size as f64);
                }
                let slot = by_namespace.entry(entry.namespace.clone()).or_default();
                slot.0 += 1;
                slot.1 += entry.size;
            }
        }

        let counters = self.counters_snapshot();
        for namespace in counters.keys() {
            by_namespace.entry(namespace.clone()).or_default();
        }
        for c in counters.values() {
            stats.hits += c.hits;
            stats.misses += c.misses;
            stats.errors += c.errors;
        }

        let lookups = stats.hits + stats.misses;
        stats.hit_rate = percent(stats.hits, lookups);
        stats.miss_rate = if lookups > 0 { 100.0 - stats.hit_rate } else { 0.0 };
        stats.avg_hit_count = if stats.total_entries > 0 {
            total_hit_count as f64 / stats.total_entries as f64
        } else {
            0.0
        };
        stats.compression_ratio = if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };
        stats.namespace_stats = by_namespace
            .into_iter()
            .map(|(namespace, (entries, size))| {
                let c = counters.get(&namespace).copied().unwrap_or_default();
                NamespaceStats {
                    hit_rate: percent(c.hits, c.hits + c.misses),
                    namespace,
                    entries,
                    size,
                }
            })
            .collect();
        stats
    }

    fn count(&self, namespace: &str, outcome: Lookup) {
        let mut counters = self
            .inner
            .counters
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let c = counters.entry(namespace.to_string()).or_default();
        match outcome {
            Lookup::Hit => c.hits += 1,
            Lookup::Miss => c.misses += 1,
            Lookup::Error => c.errors += 1,
        }
    }

    fn counters_snapshot(&self) -> HashMap<String, LookupCounters> {
        self.inner
            .counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Handle to the background maintenance task.
pub struct MaintenanceHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signal the timers to stop and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(subsystem = "cache", error = ?e, "Cache maintenance task panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Short stable key for a list of parts: the first 16 hex chars of their SHA-256.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let hash = hex::encode(hasher.finalize());
    hash[..16].to_string()
}

fn decode<T: DeserializeOwned>(entry: &CacheEntry) -> Result<T> {
    if entry.compressed {
        let raw = compression::decompress(&entry.value)?;
        Ok(serde_json::from_slice(&raw)?)
    } else {
        Ok(serde_json::from_slice(&entry.value)?)
    }
}

/// Namespaces prefix keys as `{namespace}:{key}`, so they must be non-empty
/// and free of the separator for distinct pairs to map to distinct keys.
fn check_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(Error::InvalidInput("Cache namespace must not be empty".to_string()));
    }
    if namespace.contains(CacheEntry::KEY_SEPARATOR) {
        return Err(Error::InvalidInput(format!(
            "Cache namespace '{}' must not contain '{}'",
            namespace,
            CacheEntry::KEY_SEPARATOR
        )));
    }
    Ok(())
}

fn key_matches(regex: &Regex, full_key: &str, namespace: Option<&str>) -> bool {
    match namespace {
        Some(ns) => full_key
            .strip_prefix(ns)
            .and_then(|rest| rest.strip_prefix(CacheEntry::KEY_SEPARATOR))
            .map_or(false, |local| regex.is_match(local)),
        None => regex.is_match(full_key),
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
