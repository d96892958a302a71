use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing one ingestion run.
///
/// Counters only move forward. `processed` advances when a batch upsert is confirmed, never
/// when a point is merely buffered.
#[derive(Debug, Default)]
pub struct RunCounters {
    processed: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    malformed: AtomicU64,
    embedding_failures: AtomicU64,
    batches_succeeded: AtomicU64,
    batches_failed: AtomicU64,
    points_dropped: AtomicU64,
}

impl RunCounters {
    /// Create an empty counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch whose upsert was confirmed by the vector store.
    pub fn record_batch_success(&self, points: u64) {
        self.batches_succeeded.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(points, Ordering::Relaxed);
    }

    /// Record a batch that was dropped after exhausting retries or being cancelled.
    pub fn record_batch_failure(&self, points: u64) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
        self.points_dropped.fetch_add(points, Ordering::Relaxed);
    }

    /// Record a record skipped because its identifier was already seen.
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record refused by the quality gate.
    pub fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an input line that did not decode as a record.
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a record dropped because embedding failed or had the wrong dimension.
    pub fn record_embedding_failure(&self) {
        self.embedding_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            embedding_failures: self.embedding_failures.load(Ordering::Relaxed),
            batches_succeeded: self.batches_succeeded.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            points_dropped: self.points_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of run counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CountersSnapshot {
    /// Points confirmed stored by successful batch upserts.
    pub processed: u64,
    /// Records skipped because their identifier was already seen in this run.
    pub duplicates: u64,
    /// Records refused by the quality gate.
    pub rejected: u64,
    /// Input lines that failed to decode.
    pub malformed: u64,
    /// Records dropped by the embedding adapter.
    pub embedding_failures: u64,
    /// Batches confirmed by the vector store.
    pub batches_succeeded: u64,
    /// Batches dropped after retries were exhausted or the run was cancelled.
    pub batches_failed: u64,
    /// Points lost with failed batches.
    pub points_dropped: u64,
}
