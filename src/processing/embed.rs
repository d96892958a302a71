//! Embedding adapter with deadline, cancellation, and dimension checks.

use super::run::{CancellationSignal, Guarded, guarded};
use super::types::{AcceptedRecord, EmbedError, EmbeddedRecord};
use crate::embedding::EmbeddingClient;
use std::sync::Arc;
use std::time::Duration;

/// Wraps an [`EmbeddingClient`] with the run's deadline, cancellation, and dimension check.
#[derive(Clone)]
pub struct EmbeddingAdapter {
    client: Arc<dyn EmbeddingClient>,
    timeout: Duration,
}

impl EmbeddingAdapter {
    /// Wrap `client`, bounding every call by `timeout`.
    pub fn new(client: Arc<dyn EmbeddingClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Embed `canary` once and return the vector length the service produces.
    pub async fn probe_dimension(
        &self,
        canary: &str,
        cancel: &CancellationSignal,
    ) -> Result<usize, EmbedError> {
        let vector = self.call(canary, cancel).await?;
        tracing::info!(dimension = vector.len(), "Probed embedding dimension");
        Ok(vector.len())
    }

    /// Embed an accepted record, refusing vectors whose length differs from `dimension`.
    pub async fn embed(
        &self,
        record: AcceptedRecord,
        dimension: usize,
        cancel: &CancellationSignal,
    ) -> Result<EmbeddedRecord, EmbedError> {
        let source_text = record.record().embedding_text();
        let vector = self.call(&source_text, cancel).await?;
        if vector.len() != dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }
        Ok(EmbeddedRecord {
            record,
            vector,
            source_text,
        })
    }

    async fn call(&self, text: &str, cancel: &CancellationSignal) -> Result<Vec<f32>, EmbedError> {
        match guarded(cancel, self.timeout, self.client.embed(text)).await {
            Guarded::Completed(result) => Ok(result?),
            Guarded::TimedOut => Err(EmbedError::TimedOut(self.timeout)),
            Guarded::Cancelled => Err(EmbedError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClientError, HashingEmbeddingClient};
    use crate::processing::{normalize::normalize_record, quality::accept, types::RawRecord};
    use async_trait::async_trait;

    struct FixedLength(usize);

    #[async_trait]
    impl EmbeddingClient for FixedLength {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            Ok(vec![0.5; self.0])
        }
    }

    struct Down;

    #[async_trait]
    impl EmbeddingClient for Down {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            Err(EmbeddingClientError::Unavailable("connection refused".into()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl EmbeddingClient for Stalled {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![1.0])
        }
    }

    fn accepted() -> AcceptedRecord {
        let raw = RawRecord {
            id: "7".into(),
            title: "Statins after ischemic stroke".into(),
            abstract_text: "A cohort of adults followed for recurrent vascular events.".into(),
            ..Default::default()
        };
        accept(normalize_record(raw, "test")).expect("accepted")
    }

    #[tokio::test]
    async fn probe_reports_vector_length() {
        let adapter = EmbeddingAdapter::new(
            Arc::new(HashingEmbeddingClient::new(16)),
            Duration::from_secs(1),
        );
        let dimension = adapter
            .probe_dimension("cardiovascular disease treatment", &CancellationSignal::never())
            .await
            .expect("probe");
        assert_eq!(dimension, 16);
    }

    #[tokio::test]
    async fn embedded_record_keeps_source_text() {
        let adapter = EmbeddingAdapter::new(Arc::new(FixedLength(4)), Duration::from_secs(1));
        let embedded = adapter
            .embed(accepted(), 4, &CancellationSignal::never())
            .await
            .expect("embed");
        assert_eq!(embedded.vector.len(), 4);
        assert!(embedded.source_text.starts_with("Statins after ischemic stroke "));
    }

    #[tokio::test]
    async fn wrong_length_is_rejected_not_coerced() {
        let adapter = EmbeddingAdapter::new(Arc::new(FixedLength(3)), Duration::from_secs(1));
        let err = adapter
            .embed(accepted(), 4, &CancellationSignal::never())
            .await
            .expect_err("mismatch");
        assert!(matches!(
            err,
            EmbedError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn transport_failure_and_deadline_are_distinct() {
        let down = EmbeddingAdapter::new(Arc::new(Down), Duration::from_secs(1));
        let err = down
            .embed(accepted(), 4, &CancellationSignal::never())
            .await
            .expect_err("down");
        assert!(matches!(err, EmbedError::Unavailable(_)));

        let stalled = EmbeddingAdapter::new(Arc::new(Stalled), Duration::from_millis(20));
        let err = stalled
            .embed(accepted(), 4, &CancellationSignal::never())
            .await
            .expect_err("stalled");
        assert!(matches!(err, EmbedError::TimedOut(_)));
    }
}
