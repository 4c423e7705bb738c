//! # mnemos-jobs
//!
//! Ingestion of business records into the vector store.
//!
//! This crate provides:
//! - Deterministic document builders for every synced record type
//! - Pluggable per-type syncers behind [`EntitySyncer`]
//! - A single-job [`IngestionPipeline`] with cancellation, a job deadline and
//!   progress events over a broadcast channel
//! - The `mnemos-sync` command line runner
//!
//! ## Example
//!
//! ```ignore
//! use mnemos_jobs::{IngestionPipeline, PipelineConfig};
//!
//! let pipeline = IngestionPipeline::builder(store)
//!     .with_config(PipelineConfig::from_env())
//!     .with_domain(db.domain_arc())
//!     .with_job_repository(db.jobs_arc())
//!     .build();
//!
//! let job = pipeline.start_full_sync("org-1", None).await?;
//! let mut events = pipeline.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//! ```

pub mod builders;
pub mod pipeline;
pub mod syncer;
pub mod tally;

// Re-export core types
pub use mnemos_core::*;

pub use pipeline::{
    IngestionEvent, IngestionPipeline, PipelineBuilder, PipelineConfig, CANCELLED_ERROR,
};
pub use syncer::{DomainSyncer, EntitySyncer, SyncerRegistry};
pub use tally::{RecordFailure, RecordTally};
