use std::{env, sync::Once};

use medindex::{
    config, embedding,
    processing::{CancellationSignal, IndexingPipeline, InputSource, PipelineSettings},
    qdrant::QdrantService,
    store::VectorStore,
};
use std::sync::Arc;

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() -> &'static config::Config {
    INIT.call_once(|| {
        set_default_env("QDRANT_URL", "http://127.0.0.1:6333");
        set_default_env("QDRANT_COLLECTION_NAME", "medindex_live_validation");
        set_default_env("EMBEDDING_PROVIDER", "http");
        set_default_env("EMBEDDING_URL", "http://127.0.0.1:8000");
        config::init_config().expect("config");
    });
    config::get_config()
}

#[tokio::test]
#[ignore = "Requires live Qdrant"]
async fn live_qdrant_lists_collections() {
    let config = init_config_once();
    let service = QdrantService::new(config).expect("client");
    let collections = VectorStore::list_collections(&service)
        .await
        .expect("Qdrant should be reachable");
    tracing::debug!(?collections, "Live collections");
}

#[tokio::test]
#[ignore = "Requires live embedding service"]
async fn live_embedding_roundtrip() {
    let config = init_config_once();
    let client = embedding::get_embedding_client(config).expect("client");
    let vector = client
        .embed("cardiovascular disease treatment")
        .await
        .expect("embedding service should answer");
    assert!(!vector.is_empty());
}

#[tokio::test]
#[ignore = "Requires live Qdrant and embedding service"]
async fn live_run_reconciles() {
    let config = init_config_once();
    let pipeline = IndexingPipeline::new(
        embedding::get_embedding_client(config).expect("embedder"),
        Arc::new(QdrantService::new(config).expect("qdrant")),
        PipelineSettings::from_config(config),
    );
    let input = r#"{"id":"live-1","title":"Statin therapy after ischemic stroke","abstract":"Patients were followed for recurrent vascular events over two years."}"#;
    let report = pipeline
        .run(
            &[InputSource::inline("live.jsonl", input)],
            CancellationSignal::never(),
        )
        .await
        .expect("run");
    assert_eq!(report.totals.processed, 1);
    let reconciliation = report.reconciliation.expect("reconciled");
    assert!(reconciliation.stored >= 1);
}
