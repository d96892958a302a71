//! Embedding client abstraction and adapters.

mod hashing;
mod http;

use crate::config::{Config, DEFAULT_HASHING_DIMENSION, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use hashing::HashingEmbeddingClient;
pub use http::HttpEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider could not be reached or failed to answer.
    #[error("Embedding service unavailable: {0}")]
    Unavailable(String),
    /// Provider answered with a body that does not follow the contract.
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
    /// Provider answered successfully but returned no vector components.
    #[error("Embedding service returned an empty vector")]
    EmptyVector,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for the supplied text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    match config.embedding_provider {
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbeddingClient::new(
            &config.embedding_url,
            std::time::Duration::from_secs(config.request_timeout_secs),
        )?)),
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbeddingClient::new(
            config
                .embedding_dimension
                .unwrap_or(DEFAULT_HASHING_DIMENSION),
        ))),
    }
}
