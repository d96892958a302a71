use super::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    vector: Vec<f32>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    dims: Option<usize>,
}

/// Client for a sentence-transformer service exposing `POST /embed`.
///
/// Request: `{"text": "..."}`. Response: `{"vector": [...], "model": "...", "dims": N}`.
pub struct HttpEmbeddingClient {
    client: Client,
    endpoint: String,
}

impl HttpEmbeddingClient {
    /// Build a client for the service rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EmbeddingClientError> {
        let client = Client::builder()
            .user_agent("medindex/0.1")
            .timeout(timeout)
            .build()
            .map_err(|err| EmbeddingClientError::Unavailable(err.to_string()))?;
        let endpoint = format!("{}/embed", base_url.trim_end_matches('/'));
        tracing::debug!(endpoint = %endpoint, "Initialized embedding HTTP client");
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { text })
            .send()
            .await
            .map_err(|err| EmbeddingClientError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::Unavailable(format!(
                "embedding service returned {status}: {body}"
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingClientError::InvalidResponse(err.to_string()))?;

        if payload.vector.is_empty() {
            return Err(EmbeddingClientError::EmptyVector);
        }
        if let Some(dims) = payload.dims
            && dims != payload.vector.len()
        {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "reported {dims} dims but returned {} components",
                payload.vector.len()
            )));
        }

        tracing::trace!(
            model = payload.model.as_deref().unwrap_or("unknown"),
            dims = payload.vector.len(),
            "Embedding generated"
        );
        Ok(payload.vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client(server: &MockServer) -> HttpEmbeddingClient {
        HttpEmbeddingClient::new(&server.base_url(), Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn posts_text_and_reads_vector() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embed")
                    .json_body(json!({ "text": "asthma in children" }));
                then.status(200).json_body(json!({
                    "vector": [0.1, 0.2, 0.3],
                    "model": "sentence-transformers/all-MiniLM-L6-v2",
                    "dims": 3
                }));
            })
            .await;

        let vector = client(&server)
            .embed("asthma in children")
            .await
            .expect("embed");
        mock.assert_async().await;
        assert_eq!(vector.len(), 3);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(503).json_body(json!({ "detail": "Model not loaded" }));
            })
            .await;

        let err = client(&server).embed("x").await.expect_err("503");
        assert!(matches!(err, EmbeddingClientError::Unavailable(_)));
    }

    #[tokio::test]
    async fn empty_vector_is_distinct_from_transport_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200)
                    .json_body(json!({ "vector": [], "model": "m", "dims": 0 }));
            })
            .await;

        let err = client(&server).embed("x").await.expect_err("empty");
        assert!(matches!(err, EmbeddingClientError::EmptyVector));
    }

    #[tokio::test]
    async fn inconsistent_dims_are_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embed");
                then.status(200)
                    .json_body(json!({ "vector": [0.5, 0.5], "model": "m", "dims": 3 }));
            })
            .await;

        let err = client(&server).embed("x").await.expect_err("dims");
        assert!(matches!(err, EmbeddingClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_unavailable() {
        let client = HttpEmbeddingClient::new("http://127.0.0.1:9", Duration::from_millis(200))
            .expect("client");
        let err = client.embed("x").await.expect_err("unreachable");
        assert!(matches!(err, EmbeddingClientError::Unavailable(_)));
    }
}
