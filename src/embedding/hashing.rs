use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;

/// Deterministic embedding client that hashes text bytes into a fixed-size unit vector.
///
/// Vectors carry no semantics; the client exists so the pipeline can run end to end
/// without an embedding service (dry runs, smoke tests).
pub struct HashingEmbeddingClient {
    dimension: usize,
}

impl HashingEmbeddingClient {
    /// Construct a client producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashingEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::Unavailable(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self::encode(text, self.dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vectors_are_deterministic_and_normalized() {
        let client = HashingEmbeddingClient::new(8);
        let first = client.embed("myocardial infarction").await.expect("embed");
        let second = client.embed("myocardial infarction").await.expect("embed");
        assert_eq!(first, second);
        assert_eq!(first.len(), 8);
        let norm: f32 = first.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn zero_dimension_is_an_error() {
        let client = HashingEmbeddingClient::new(0);
        assert!(client.embed("text").await.is_err());
    }
}
