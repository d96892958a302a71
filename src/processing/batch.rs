//! Bounded batching of embedded records with retrying upserts.
//!
//! Each batch moves through `Pending -> Uploading -> (Succeeded | Retrying -> Uploading)`
//! and ends in `Succeeded` or `Failed`. Run counters advance only from `Succeeded`, and the
//! final partial batch goes through the same path as full ones.

use super::enrich::Enrichment;
use super::run::{Guarded, IngestionRun, guarded, interruptible_sleep};
use super::types::{EmbeddedRecord, RetryPolicy};
use crate::qdrant::{build_payload, derive_point_id};
use crate::store::{IndexPoint, VectorStore};
use serde::Serialize;
use std::time::Duration;

/// Lifecycle state of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    /// Buffered, not yet sent.
    Pending,
    /// Upsert call in flight.
    Uploading,
    /// Last attempt failed; waiting out the backoff.
    Retrying,
    /// Store confirmed the upsert.
    Succeeded,
    /// Retries exhausted or run cancelled; the batch was dropped.
    Failed,
}

impl BatchState {
    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// What happened to one flushed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// 1-based batch number within its source.
    pub number: u64,
    /// Points in the batch.
    pub size: usize,
    /// Upsert attempts made.
    pub attempts: u32,
    /// Terminal state.
    pub state: BatchState,
    /// Every state the batch passed through, in order.
    pub transitions: Vec<BatchState>,
    /// Last upsert error, if any attempt failed.
    pub last_error: Option<String>,
}

impl BatchOutcome {
    /// Whether the batch was confirmed by the store.
    pub fn succeeded(&self) -> bool {
        self.state == BatchState::Succeeded
    }
}

/// Per-source buffer that converts embedded records into points and upserts them in batches.
pub struct BatchUpserter<'a> {
    store: &'a dyn VectorStore,
    run: &'a IngestionRun,
    source: &'a str,
    collection: &'a str,
    batch_size: usize,
    retry: RetryPolicy,
    timeout: Duration,
    buffer: Vec<IndexPoint>,
    batches: u64,
}

impl<'a> BatchUpserter<'a> {
    /// Create an empty buffer for `source` writing into `collection`.
    pub fn new(
        store: &'a dyn VectorStore,
        run: &'a IngestionRun,
        source: &'a str,
        collection: &'a str,
        batch_size: usize,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            run,
            source,
            collection,
            batch_size,
            retry,
            timeout,
            buffer: Vec::with_capacity(batch_size),
            batches: 0,
        }
    }

    /// Points currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Take ownership of an embedded record; uploads the batch once it reaches the bound.
    pub async fn push(&mut self, embedded: EmbeddedRecord) -> Option<BatchOutcome> {
        let record = embedded.record.into_inner();
        let enrichment = Enrichment::for_record(&record);
        self.buffer.push(IndexPoint {
            id: derive_point_id(&record.id),
            vector: embedded.vector,
            payload: build_payload(&record, &enrichment),
        });
        if self.buffer.len() >= self.batch_size {
            return Some(self.flush().await);
        }
        None
    }

    /// Upload whatever remains buffered.
    pub async fn finish(mut self) -> Option<BatchOutcome> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.flush().await)
    }

    async fn flush(&mut self) -> BatchOutcome {
        let points = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        self.batches += 1;
        self.upload(self.batches, points).await
    }

    async fn upload(&self, number: u64, points: Vec<IndexPoint>) -> BatchOutcome {
        let size = points.len();
        let cancel = self.run.cancellation();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut state = BatchState::Pending;
        let mut transitions = vec![state];
        let mut attempts = 0;
        let mut last_error = None;

        while !state.is_terminal() {
            state = match state {
                BatchState::Pending | BatchState::Retrying => {
                    attempts += 1;
                    BatchState::Uploading
                }
                BatchState::Uploading => {
                    let failure = match guarded(
                        cancel,
                        self.timeout,
                        self.store.upsert(self.collection, &points),
                    )
                    .await
                    {
                        Guarded::Completed(Ok(())) => None,
                        Guarded::Completed(Err(err)) => Some((err.to_string(), true)),
                        Guarded::TimedOut => {
                            Some((format!("upsert timed out after {:?}", self.timeout), true))
                        }
                        Guarded::Cancelled => Some(("run cancelled".to_string(), false)),
                    };
                    match failure {
                        None => BatchState::Succeeded,
                        Some((error, retryable)) if !retryable || attempts >= max_attempts => {
                            last_error = Some(error);
                            BatchState::Failed
                        }
                        Some((error, _)) => {
                            let delay = self.retry.delay_after(attempts);
                            tracing::warn!(
                                source = self.source,
                                batch = number,
                                size,
                                attempt = attempts,
                                max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "Batch upsert failed; retrying"
                            );
                            last_error = Some(error);
                            if interruptible_sleep(cancel, delay).await {
                                BatchState::Retrying
                            } else {
                                last_error = Some("run cancelled".to_string());
                                BatchState::Failed
                            }
                        }
                    }
                }
                BatchState::Succeeded | BatchState::Failed => state,
            };
            transitions.push(state);
        }

        let counters = self.run.counters();
        if state == BatchState::Succeeded {
            counters.record_batch_success(size as u64);
            tracing::debug!(
                source = self.source,
                batch = number,
                size,
                attempts,
                "Batch upserted"
            );
        } else {
            counters.record_batch_failure(size as u64);
            let ids = points
                .iter()
                .map(|point| point.id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            tracing::error!(
                source = self.source,
                batch = number,
                size,
                attempts,
                error = last_error.as_deref().unwrap_or("unknown"),
                ids = %ids,
                "Dropping batch after failed upsert"
            );
        }

        BatchOutcome {
            number,
            size,
            attempts,
            state,
            transitions,
            last_error,
        }
    }
}
