//! Post-run comparison of processed and stored counts.

use crate::store::{StoreError, VectorStore};
use serde::Serialize;

/// Comparison of confirmed-processed records against the stored point count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Sum of records in batches the store confirmed.
    pub expected: u64,
    /// Points the store reports for the collection.
    pub stored: u64,
    /// `stored - expected`; positive when the collection holds points from earlier runs.
    pub discrepancy: i64,
}

impl Reconciliation {
    /// Compare `expected` with `stored`.
    pub fn compute(expected: u64, stored: u64) -> Self {
        let discrepancy = i128::from(stored) - i128::from(expected);
        Self {
            expected,
            stored,
            discrepancy: discrepancy.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
        }
    }

    /// Whether the counts agree.
    pub fn is_consistent(&self) -> bool {
        self.discrepancy == 0
    }
}

/// Query the store's point count and compare it with `expected`.
///
/// A discrepancy is logged as a warning; upserts overwrite by identifier, so a mismatch
/// can come from earlier runs as well as from miscounting.
pub async fn reconcile(
    store: &dyn VectorStore,
    collection: &str,
    expected: u64,
) -> Result<Reconciliation, StoreError> {
    let stored = store.count(collection).await?;
    let reconciliation = Reconciliation::compute(expected, stored);
    if reconciliation.is_consistent() {
        tracing::info!(collection, expected, stored, "Stored count matches processed count");
    } else {
        tracing::warn!(
            collection,
            expected,
            stored,
            discrepancy = reconciliation.discrepancy,
            "Stored count differs from processed count"
        );
    }
    Ok(reconciliation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Distance, IndexPoint, MemoryStore, PointId};
    use serde_json::Map;

    #[test]
    fn discrepancy_is_signed() {
        assert_eq!(Reconciliation::compute(5, 5).discrepancy, 0);
        assert_eq!(Reconciliation::compute(5, 8).discrepancy, 3);
        assert_eq!(Reconciliation::compute(8, 5).discrepancy, -3);
        assert!(!Reconciliation::compute(0, 1).is_consistent());
    }

    #[tokio::test]
    async fn compares_against_store_count() {
        let store = MemoryStore::new();
        store
            .create_collection("c", 2, Distance::Cosine)
            .await
            .expect("create");
        let points: Vec<IndexPoint> = (1..=3)
            .map(|id| IndexPoint {
                id: PointId::Num(id),
                vector: vec![1.0, 0.0],
                payload: Map::new(),
            })
            .collect();
        store.upsert("c", &points).await.expect("upsert");

        let matched = reconcile(&store, "c", 3).await.expect("reconcile");
        assert!(matched.is_consistent());
        let prior_run = reconcile(&store, "c", 2).await.expect("reconcile");
        assert_eq!(prior_run.discrepancy, 1);
        assert!(reconcile(&store, "missing", 0).await.is_err());
    }
}
