//! # mnemos-cache
//!
//! Two-tier cache for expensive AI calls and lookups.
//!
//! - [`CacheService`]: LRU memory tier over an optional persistent
//!   [`CacheRepository`], with TTL, namespaces, tags, regex invalidation and
//!   gzip compression of large values
//! - [`CacheConfig`]: capacity, TTL, compression and maintenance tunables
//! - [`MaintenanceHandle`]: background expiry sweep and memory monitor
//!
//! # Example
//!
//! ```rust,ignore
//! use mnemos_cache::{CacheConfig, CacheService, SetOptions};
//!
//! let cache = CacheService::new(CacheConfig::from_env(), Some(db.cache_arc()));
//! let summary: String = cache
//!     .get_or_set("weekly", || summarize(org), &SetOptions::new().in_namespace("summaries"))
//!     .await?;
//! ```

pub mod compression;
pub mod config;
pub mod service;

// Re-export core types
pub use mnemos_core::*;

pub use config::CacheConfig;
pub use service::{
    fingerprint, CacheService, MaintenanceHandle, SetOptions, SweepReport, WarmEntry,
    WarmFailure, WarmReport,
};
