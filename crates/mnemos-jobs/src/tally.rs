//! Per-record outcome accounting for an ingestion run.

use serde::{Deserialize, Serialize};

use mnemos_core::{Error, JobStats};

/// A record that could not be ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Document id, or the entity type name when a whole type failed to load.
    pub id: String,
    pub error: String,
}

/// Counts every record exactly once as successful, failed or skipped.
#[derive(Debug, Clone, Default)]
pub struct RecordTally {
    stats: JobStats,
    failures: Vec<RecordFailure>,
}

impl RecordTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self) {
        self.stats.total_processed += 1;
        self.stats.successful += 1;
    }

    /// Record a failed record and its error message.
    pub fn failure(&mut self, id: impl Into<String>, error: &Error) {
        self.stats.total_processed += 1;
        self.stats.failed += 1;
        self.failures.push(RecordFailure {
            id: id.into(),
            error: error.to_string(),
        });
    }

    pub fn skip(&mut self) {
        self.stats.total_processed += 1;
        self.stats.skipped += 1;
    }

    pub fn stats(&self) -> JobStats {
        self.stats
    }

    pub fn failures(&self) -> &[RecordFailure] {
        &self.failures
    }

    /// Fold another tally into this one.
    pub fn absorb(&mut self, other: RecordTally) {
        self.stats.merge(&other.stats);
        self.failures.extend(other.failures);
    }
}
