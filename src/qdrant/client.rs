//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::qdrant::types::{CountResponse, ListCollectionsResponse, QdrantError};
use crate::store::{Distance, IndexPoint, StoreError, VectorStore};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::json;
use std::time::Duration;

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a client from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("medindex/0.1")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
        })
    }

    /// Create a collection with the specified vector size and distance metric.
    pub async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": distance.as_str()
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, vector_size, "Collection created");
        })
        .await
    }

    /// Retrieve the names of all collections present in Qdrant.
    pub async fn list_collections(&self) -> Result<Vec<String>, QdrantError> {
        let response = self.request(Method::GET, "collections").send().await?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse = response.json().await?;
            let names = payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect();
            Ok(names)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Failed to list collections");
            Err(error)
        }
    }

    /// Upsert points into the collection, waiting for Qdrant to apply them.
    pub async fn upsert_points(
        &self,
        collection_name: &str,
        points: &[IndexPoint],
    ) -> Result<(), QdrantError> {
        if points.is_empty() {
            return Ok(());
        }

        let serialized: Vec<_> = points
            .iter()
            .map(|point| {
                json!({
                    "id": point.id.to_json(),
                    "vector": point.vector,
                    "payload": point.payload,
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await
    }

    /// Exact point count for the collection.
    pub async fn count_points(&self, collection_name: &str) -> Result<u64, QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{collection_name}/points/count"),
            )
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = collection_name, error = %error, "Qdrant count failed");
            return Err(error);
        }

        let CountResponse { result } = response.json().await?;
        Ok(result.count)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(QdrantService::list_collections(self).await?)
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError> {
        Ok(QdrantService::create_collection(self, name, dimension, distance).await?)
    }

    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<(), StoreError> {
        Ok(self.upsert_points(collection, points).await?)
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        Ok(self.count_points(collection).await?)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PointId;
    use httpmock::{
        Method::{GET, POST, PUT},
        MockServer,
    };
    use serde_json::{Map, Value};

    fn service(server: &MockServer) -> QdrantService {
        QdrantService {
            client: Client::builder()
                .user_agent("medindex-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            api_key: Some("secret".into()),
        }
    }

    #[tokio::test]
    async fn list_collections_reads_names() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/collections")
                    .header("api-key", "secret");
                then.status(200).json_body(json!({
                    "status": "ok",
                    "time": 0.0,
                    "result": {
                        "collections": [{ "name": "medical_abstracts" }, { "name": "other" }]
                    }
                }));
            })
            .await;

        let names = service(&server).list_collections().await.expect("list");
        mock.assert_async().await;
        assert_eq!(names, vec!["medical_abstracts".to_string(), "other".to_string()]);
    }

    #[tokio::test]
    async fn create_collection_sends_size_and_cosine() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/medical_abstracts")
                    .json_body(json!({ "vectors": { "size": 384, "distance": "Cosine" } }));
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": true }));
            })
            .await;

        service(&server)
            .create_collection("medical_abstracts", 384, Distance::Cosine)
            .await
            .expect("create");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upsert_points_waits_and_serializes_ids() {
        let server = MockServer::start_async().await;
        let mut payload = Map::new();
        payload.insert("title".into(), Value::String("Example".into()));

        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/collections/demo/points")
                    .query_param("wait", "true")
                    .json_body(json!({
                        "points": [
                            { "id": 17, "vector": [0.25, 0.5], "payload": { "title": "Example" } }
                        ]
                    }));
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "status": "completed" } }));
            })
            .await;

        let points = vec![IndexPoint {
            id: PointId::Num(17),
            vector: vec![0.25, 0.5],
            payload,
        }];
        service(&server)
            .upsert_points("demo", &points)
            .await
            .expect("upsert");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upsert_failure_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/collections/demo/points");
                then.status(503).body("overloaded");
            })
            .await;

        let points = vec![IndexPoint {
            id: PointId::Num(1),
            vector: vec![1.0],
            payload: Map::new(),
        }];
        let err = service(&server)
            .upsert_points("demo", &points)
            .await
            .expect_err("503 should fail");
        match err {
            QdrantError::UnexpectedStatus { status, body } => {
                assert_eq!(status.as_u16(), 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn count_points_requests_exact_count() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/collections/demo/points/count")
                    .json_body(json!({ "exact": true }));
                then.status(200)
                    .json_body(json!({ "status": "ok", "result": { "count": 42 } }));
            })
            .await;

        let count = service(&server).count_points("demo").await.expect("count");
        mock.assert_async().await;
        assert_eq!(count, 42);
    }

    #[test]
    fn base_url_is_normalized() {
        assert_eq!(
            normalize_base_url("http://localhost:6333/").expect("url"),
            "http://localhost:6333/"
        );
        assert_eq!(
            format_endpoint("http://localhost:6333/", "/collections"),
            "http://localhost:6333/collections"
        );
        assert!(normalize_base_url("not a url").is_err());
    }
}
