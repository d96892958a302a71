use std::sync::Arc;

use httpmock::{
    Method::{GET, POST, PUT},
    MockServer,
};
use medindex::{
    config::{Config, EmbeddingProvider},
    embedding::get_embedding_client,
    processing::{CancellationSignal, IndexingPipeline, InputSource, PipelineSettings},
    qdrant::QdrantService,
};
use serde_json::json;

fn config(qdrant: &MockServer, embedder: &MockServer) -> Config {
    Config {
        qdrant_url: qdrant.base_url(),
        qdrant_collection_name: "medical_abstracts".to_string(),
        qdrant_api_key: Some("secret".to_string()),
        embedding_provider: EmbeddingProvider::Http,
        embedding_url: embedder.base_url(),
        embedding_dimension: None,
        embedding_canary_text: "cardiovascular disease treatment".to_string(),
        index_batch_size: 2,
        upsert_max_attempts: 3,
        upsert_backoff_ms: 1,
        request_timeout_secs: 5,
        source_concurrency: 1,
        log_file: "logs/medindex.log".into(),
    }
}

const INPUT: &str = concat!(
    r#"{"pmid":38000001,"title":"Statin therapy after ischemic stroke","abstract":"<p>Patients with prior MI were randomized to high-intensity statins.</p>","authors":[{"last_name":"Ito","fore_name":"Ken"},"Jane Smith"],"published_date":"2021-03-07T00:00:00Z","doi":"https://doi.org/10.1161/STROKEAHA.120.032000","publication_types":["Randomized Controlled Trial"],"source":"pubmed"}"#,
    "\n",
    r#"{"id":"pmc-77","title":"Blood pressure targets in older adults","abstract":"A cohort of adults over seventy followed for cardiovascular events.","authors":"Doe A","published_date":"2019-11-2"}"#,
    "\n",
    r#"{"pmid":38000001,"title":"Statin therapy after ischemic stroke","abstract":"Duplicate copy from a second export of the same article."}"#,
    "\n",
);

#[tokio::test]
async fn indexes_into_qdrant_over_http() {
    let qdrant = MockServer::start_async().await;
    let embedder = MockServer::start_async().await;

    let embed = embedder
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200).json_body(json!({
                "vector": [0.1, 0.2, 0.3, 0.4],
                "model": "sentence-transformers/all-MiniLM-L6-v2",
                "dims": 4
            }));
        })
        .await;
    let list = qdrant
        .mock_async(|when, then| {
            when.method(GET)
                .path("/collections")
                .header("api-key", "secret");
            then.status(200)
                .json_body(json!({ "result": { "collections": [] }, "status": "ok" }));
        })
        .await;
    let create = qdrant
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/medical_abstracts")
                .json_body(json!({ "vectors": { "size": 4, "distance": "Cosine" } }));
            then.status(200).json_body(json!({ "result": true, "status": "ok" }));
        })
        .await;
    let upsert = qdrant
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/medical_abstracts/points")
                .query_param("wait", "true")
                .body_contains("\"id\":38000001")
                .body_contains("Myocardial Infarction")
                .body_contains("\"doi\":\"10.1161/STROKEAHA.120.032000\"")
                .body_contains("\"authors\":\"Ken Ito and Jane Smith\"");
            then.status(200)
                .json_body(json!({ "result": { "status": "completed" }, "status": "ok" }));
        })
        .await;
    let count = qdrant
        .mock_async(|when, then| {
            when.method(POST)
                .path("/collections/medical_abstracts/points/count")
                .json_body(json!({ "exact": true }));
            then.status(200)
                .json_body(json!({ "result": { "count": 2 }, "status": "ok" }));
        })
        .await;

    let config = config(&qdrant, &embedder);
    let pipeline = IndexingPipeline::new(
        get_embedding_client(&config).expect("embedder"),
        Arc::new(QdrantService::new(&config).expect("qdrant")),
        PipelineSettings::from_config(&config),
    );
    let report = pipeline
        .run(
            &[InputSource::inline("export.jsonl", INPUT)],
            CancellationSignal::never(),
        )
        .await
        .expect("run");

    list.assert_async().await;
    create.assert_async().await;
    upsert.assert_hits_async(1).await;
    count.assert_async().await;
    // canary plus two accepted records
    embed.assert_hits_async(3).await;

    assert_eq!(report.dimension, 4);
    assert_eq!(report.totals.processed, 2);
    assert_eq!(report.totals.duplicates, 1);
    let reconciliation = report.reconciliation.expect("reconciled");
    assert_eq!(reconciliation.discrepancy, 0);
}

#[tokio::test]
async fn unreachable_embedding_service_aborts_before_qdrant_writes() {
    let qdrant = MockServer::start_async().await;
    let embedder = MockServer::start_async().await;
    embedder
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(503).json_body(json!({ "detail": "Model not loaded" }));
        })
        .await;
    let list = qdrant
        .mock_async(|when, then| {
            when.method(GET).path("/collections");
            then.status(200)
                .json_body(json!({ "result": { "collections": [] } }));
        })
        .await;

    let config = config(&qdrant, &embedder);
    let pipeline = IndexingPipeline::new(
        get_embedding_client(&config).expect("embedder"),
        Arc::new(QdrantService::new(&config).expect("qdrant")),
        PipelineSettings::from_config(&config),
    );
    let result = pipeline
        .run(
            &[InputSource::inline("export.jsonl", INPUT)],
            CancellationSignal::never(),
        )
        .await;

    assert!(result.is_err());
    list.assert_hits_async(0).await;
}
