//! Idempotent creation of the target collection.

use crate::store::{Distance, StoreError, VectorStore};

/// How [`ensure_collection`] found the target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionSetup {
    /// Collection already existed and was left untouched.
    Existing,
    /// Collection was absent and has been created.
    Created,
}

/// Make sure `name` exists, creating it with `dimension` and cosine distance when absent.
///
/// An existing collection is never recreated or altered.
pub async fn ensure_collection(
    store: &dyn VectorStore,
    name: &str,
    dimension: usize,
) -> Result<CollectionSetup, StoreError> {
    let collections = store.list_collections().await?;
    if collections.iter().any(|existing| existing == name) {
        tracing::info!(collection = name, "Collection already exists; leaving it untouched");
        return Ok(CollectionSetup::Existing);
    }

    tracing::info!(collection = name, dimension, "Creating collection");
    store
        .create_collection(name, dimension, Distance::Cosine)
        .await?;
    Ok(CollectionSetup::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IndexPoint, MemoryStore, PointId};
    use serde_json::Map;

    #[tokio::test]
    async fn creates_missing_collection_with_dimension() {
        let store = MemoryStore::new();
        let setup = ensure_collection(&store, "medical_abstracts", 384)
            .await
            .expect("ensure");
        assert_eq!(setup, CollectionSetup::Created);
        assert_eq!(store.dimension("medical_abstracts").await, Some(384));
    }

    #[tokio::test]
    async fn existing_collection_is_left_alone() {
        let store = MemoryStore::new();
        store
            .create_collection("medical_abstracts", 3, Distance::Cosine)
            .await
            .expect("create");
        store
            .upsert(
                "medical_abstracts",
                &[IndexPoint {
                    id: PointId::Num(1),
                    vector: vec![0.0, 1.0, 0.0],
                    payload: Map::new(),
                }],
            )
            .await
            .expect("upsert");

        let setup = ensure_collection(&store, "medical_abstracts", 384)
            .await
            .expect("ensure");
        assert_eq!(setup, CollectionSetup::Existing);
        assert_eq!(store.dimension("medical_abstracts").await, Some(3));
        assert_eq!(store.count("medical_abstracts").await.expect("count"), 1);
    }
}
