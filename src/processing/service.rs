//! Indexing service coordinating setup, per-source processing, and reconciliation.

use crate::{
    embedding::EmbeddingClient,
    processing::{
        batch::BatchUpserter,
        collection::{CollectionSetup, ensure_collection},
        embed::EmbeddingAdapter,
        reader::{InputSource, SourceLine, SourceReader},
        reconcile::{Reconciliation, reconcile},
        report::{RunReport, SourceReport},
        run::{CancellationSignal, Guarded, IngestionRun, guarded},
        screen::{Screened, screen},
        types::{EmbedError, PipelineSettings, ProcessingError},
    },
    store::VectorStore,
};
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use std::time::Instant;

/// Collection state established before any source is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedCollection {
    /// Vector length reported by the embedding canary.
    pub dimension: usize,
    /// Whether the collection had to be created.
    pub setup: CollectionSetup,
}

/// Runs the full indexing pipeline: normalize, gate, dedup, embed, and batch upsert.
///
/// The service owns handles to the embedding client and vector store. Every run gets a
/// fresh [`IngestionRun`], so one service can execute several runs back to back.
pub struct IndexingPipeline {
    embedder: EmbeddingAdapter,
    store: Arc<dyn VectorStore>,
    settings: PipelineSettings,
}

impl IndexingPipeline {
    /// Build a pipeline over the given collaborators.
    pub fn new(
        embedding_client: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder: EmbeddingAdapter::new(embedding_client, settings.request_timeout),
            store,
            settings,
        }
    }

    /// Settings the pipeline was built with.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Probe the embedding dimension and ensure the target collection exists.
    ///
    /// Any failure here is fatal for the run.
    pub async fn prepare(
        &self,
        cancel: &CancellationSignal,
    ) -> Result<PreparedCollection, ProcessingError> {
        let dimension = self
            .embedder
            .probe_dimension(&self.settings.canary_text, cancel)
            .await
            .map_err(|err| match err {
                EmbedError::Cancelled => ProcessingError::Cancelled,
                other => ProcessingError::EmbeddingProbe(other),
            })?;

        if let Some(configured) = self.settings.expected_dimension
            && configured != dimension
        {
            return Err(ProcessingError::DimensionConflict {
                configured,
                probed: dimension,
            });
        }

        let timeout = self.settings.request_timeout;
        let setup = match guarded(
            cancel,
            timeout,
            ensure_collection(self.store.as_ref(), &self.settings.collection, dimension),
        )
        .await
        {
            Guarded::Completed(result) => result?,
            Guarded::TimedOut => return Err(ProcessingError::TimedOut(timeout)),
            Guarded::Cancelled => return Err(ProcessingError::Cancelled),
        };

        Ok(PreparedCollection { dimension, setup })
    }

    /// Index every source and reconcile the stored count.
    ///
    /// Only setup failures return `Err`; per-record and per-batch failures are tallied in the
    /// report and the run continues.
    pub async fn run(
        &self,
        sources: &[InputSource],
        cancel: CancellationSignal,
    ) -> Result<RunReport, ProcessingError> {
        let started = Instant::now();
        let run = IngestionRun::new(cancel);
        let prepared = self.prepare(run.cancellation()).await?;
        let collection = self.settings.collection.as_str();

        tracing::info!(
            run_id = %run.id(),
            collection,
            dimension = prepared.dimension,
            sources = sources.len(),
            batch_size = self.settings.batch_size,
            "Starting indexing run"
        );

        let source_reports: Vec<SourceReport> = stream::iter(sources)
            .map(|source| self.process_source(&run, source, prepared.dimension))
            .buffered(self.settings.source_concurrency.max(1))
            .collect()
            .await;

        let totals = run.counters().snapshot();
        let cancelled = run.is_cancelled();
        let reconciliation = if cancelled {
            tracing::warn!(run_id = %run.id(), "Run cancelled; skipping reconciliation");
            None
        } else {
            self.reconcile(&run, totals.processed).await
        };

        let report = RunReport {
            run_id: run.id(),
            collection: collection.to_string(),
            dimension: prepared.dimension,
            sources: source_reports,
            totals,
            reconciliation,
            cancelled,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        tracing::info!(
            run_id = %report.run_id,
            processed = totals.processed,
            duplicates = totals.duplicates,
            rejected = totals.rejected,
            malformed = totals.malformed,
            embedding_failures = totals.embedding_failures,
            batches_failed = totals.batches_failed,
            points_dropped = totals.points_dropped,
            cancelled,
            elapsed_ms = report.elapsed_ms,
            "Indexing run finished"
        );
        Ok(report)
    }

    async fn reconcile(&self, run: &IngestionRun, expected: u64) -> Option<Reconciliation> {
        let collection = self.settings.collection.as_str();
        match guarded(
            run.cancellation(),
            self.settings.request_timeout,
            reconcile(self.store.as_ref(), collection, expected),
        )
        .await
        {
            Guarded::Completed(Ok(reconciliation)) => Some(reconciliation),
            Guarded::Completed(Err(err)) => {
                tracing::warn!(collection, error = %err, "Could not read stored count");
                None
            }
            Guarded::TimedOut => {
                tracing::warn!(collection, "Timed out reading stored count");
                None
            }
            Guarded::Cancelled => None,
        }
    }

    async fn process_source(
        &self,
        run: &IngestionRun,
        source: &InputSource,
        dimension: usize,
    ) -> SourceReport {
        let name = source.name();
        let mut report = SourceReport::new(name.clone());
        let mut reader = match SourceReader::open(source).await {
            Ok(reader) => reader,
            Err(err) => {
                tracing::error!(source = %name, error = %err, "Failed to open source; skipping");
                report.error = Some(err.to_string());
                return report;
            }
        };
        tracing::info!(source = %name, "Processing source");

        let counters = run.counters();
        let mut batches = BatchUpserter::new(
            self.store.as_ref(),
            run,
            &name,
            &self.settings.collection,
            self.settings.batch_size,
            self.settings.retry,
            self.settings.request_timeout,
        );

        while !run.is_cancelled() {
            let line = match reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(source = %name, error = %err, "Failed to read source; stopping it");
                    report.error = Some(err.to_string());
                    break;
                }
            };
            report.lines_read += 1;

            let raw = match line {
                SourceLine::Record { record, .. } => record,
                SourceLine::Malformed { line, error } => {
                    tracing::warn!(source = %name, line, error = %error, "Skipping malformed line");
                    report.malformed += 1;
                    counters.record_malformed();
                    continue;
                }
            };

            let accepted = match screen(raw, &name, run.dedup()) {
                Screened::Accepted(accepted) => accepted,
                Screened::Duplicate(id) => {
                    tracing::debug!(source = %name, id = %id, "Skipping duplicate record");
                    report.duplicates += 1;
                    counters.record_duplicate();
                    continue;
                }
                Screened::Rejected { id, reason } => {
                    tracing::debug!(source = %name, id = %id, reason = %reason, "Rejected record");
                    report.record_rejection(reason);
                    counters.record_rejection();
                    continue;
                }
            };
            report.accepted += 1;

            let id = accepted.record().id.clone();
            match self
                .embedder
                .embed(accepted, dimension, run.cancellation())
                .await
            {
                Ok(embedded) => {
                    if let Some(outcome) = batches.push(embedded).await {
                        report.record_batch(&outcome);
                    }
                }
                Err(EmbedError::Cancelled) => break,
                Err(err) => {
                    tracing::warn!(source = %name, id = %id, error = %err, "Skipping record; embedding failed");
                    if matches!(err, EmbedError::DimensionMismatch { .. }) {
                        report.dimension_mismatches += 1;
                    }
                    report.embedding_failures += 1;
                    counters.record_embedding_failure();
                }
            }
        }

        if let Some(outcome) = batches.finish().await {
            report.record_batch(&outcome);
        }

        tracing::info!(
            source = %name,
            lines = report.lines_read,
            processed = report.processed,
            duplicates = report.duplicates,
            rejected = report.rejected,
            embedding_failures = report.embedding_failures,
            points_dropped = report.points_dropped,
            "Finished source"
        );
        report
    }
}
