//! Serializable per-source and per-run summaries.

use super::batch::BatchOutcome;
use super::quality::RejectionReason;
use super::reconcile::Reconciliation;
use crate::metrics::CountersSnapshot;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Tallies for one input source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    /// Source display name.
    pub source: String,
    /// Non-blank lines read.
    pub lines_read: u64,
    /// Lines that did not decode as records.
    pub malformed: u64,
    /// Records skipped because their identifier was already seen in this run.
    pub duplicates: u64,
    /// Records refused by the quality gate.
    pub rejected: u64,
    /// Rejections keyed by reason code.
    pub rejections: BTreeMap<&'static str, u64>,
    /// Records that passed the quality gate.
    pub accepted: u64,
    /// Records dropped because embedding failed (including dimension mismatches).
    pub embedding_failures: u64,
    /// Subset of embedding failures caused by a wrong vector length.
    pub dimension_mismatches: u64,
    /// Records in batches the store confirmed.
    pub processed: u64,
    /// Batches the store confirmed.
    pub batches_succeeded: u64,
    /// Batches dropped after exhausting retries or on cancellation.
    pub batches_failed: u64,
    /// Records in dropped batches.
    pub points_dropped: u64,
    /// Error that stopped the source early, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    /// Empty report for `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Tally a quality rejection.
    pub fn record_rejection(&mut self, reason: RejectionReason) {
        self.rejected += 1;
        *self.rejections.entry(reason.code()).or_default() += 1;
    }

    /// Tally a flushed batch.
    pub fn record_batch(&mut self, outcome: &BatchOutcome) {
        let size = outcome.size as u64;
        if outcome.succeeded() {
            self.batches_succeeded += 1;
            self.processed += size;
        } else {
            self.batches_failed += 1;
            self.points_dropped += size;
        }
    }
}

/// Summary of one complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// Target collection.
    pub collection: String,
    /// Vector dimension probed at startup.
    pub dimension: usize,
    /// One entry per input source, in input order.
    pub sources: Vec<SourceReport>,
    /// Run-wide counters.
    pub totals: CountersSnapshot,
    /// Stored-count comparison; absent when the run was cancelled or the count failed.
    pub reconciliation: Option<Reconciliation>,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Render the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
