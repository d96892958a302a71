//! Vector store contract consumed by the indexing pipeline.
//!
//! The pipeline only needs four operations from a store: list collections, create a
//! collection, upsert points, and count points. [`crate::qdrant::QdrantService`] speaks
//! them over HTTP; [`MemoryStore`] keeps everything in-process for dry runs and tests.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::qdrant::QdrantError;

/// Errors surfaced through the vector store contract.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Qdrant transport or status failure.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
    /// Target collection does not exist.
    #[error("Collection not found: {0}")]
    MissingCollection(String),
    /// Point vector disagrees with the collection's configured dimension.
    #[error("Vector dimension mismatch for collection {collection}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Collection receiving the point.
        collection: String,
        /// Dimension the collection was created with.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
    /// Store refused or failed the operation for another reason.
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),
}

/// Similarity metric used when creating a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Cosine similarity.
    Cosine,
}

impl Distance {
    /// Wire name understood by Qdrant.
    pub fn as_str(self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
        }
    }
}

/// Identifier of a persisted point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointId {
    /// Numeric identifier taken verbatim from a numeric record identifier.
    Num(u64),
    /// Identifier derived from the record identifier's content.
    Uuid(Uuid),
}

impl PointId {
    /// JSON representation accepted by Qdrant (`123` or `"uuid-string"`).
    pub fn to_json(&self) -> Value {
        match self {
            PointId::Num(value) => Value::from(*value),
            PointId::Uuid(uuid) => Value::String(uuid.to_string()),
        }
    }
}

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointId::Num(value) => write!(f, "{value}"),
            PointId::Uuid(uuid) => write!(f, "{uuid}"),
        }
    }
}

/// Persisted unit: identifier, embedding vector, and display payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    /// Point identifier; upserts with the same id overwrite.
    pub id: PointId,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Display fields of the accepted record.
    pub payload: Map<String, Value>,
}

/// Operations the pipeline consumes from a vector store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Names of all collections present in the store.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Create a collection with the given dimension and metric.
    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<(), StoreError>;

    /// Insert or overwrite points by identifier.
    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<(), StoreError>;

    /// Exact number of points stored in the collection.
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;
}

struct MemoryCollection {
    dimension: usize,
    points: HashMap<PointId, IndexPoint>,
}

/// In-process vector store with upsert-by-id semantics.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, MemoryCollection>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a stored point, if present.
    pub async fn get(&self, collection: &str, id: &PointId) -> Option<IndexPoint> {
        let collections = self.collections.lock().await;
        collections
            .get(collection)
            .and_then(|entry| entry.points.get(id).cloned())
    }

    /// Dimension the collection was created with, if it exists.
    pub async fn dimension(&self, collection: &str) -> Option<usize> {
        let collections = self.collections.lock().await;
        collections.get(collection).map(|entry| entry.dimension)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.collections.lock().await.keys().cloned().collect())
    }

    async fn create_collection(
        &self,
        name: &str,
        dimension: usize,
        _distance: Distance,
    ) -> Result<(), StoreError> {
        self.collections.lock().await.insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                points: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: &[IndexPoint]) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))?;

        if let Some(point) = points.iter().find(|p| p.vector.len() != entry.dimension) {
            return Err(StoreError::DimensionMismatch {
                collection: collection.to_string(),
                expected: entry.dimension,
                actual: point.vector.len(),
            });
        }

        for point in points {
            entry.points.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let collections = self.collections.lock().await;
        collections
            .get(collection)
            .map(|entry| entry.points.len() as u64)
            .ok_or_else(|| StoreError::MissingCollection(collection.to_string()))
    }
}
