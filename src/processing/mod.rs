//! Document indexing pipeline: normalization, quality gating, dedup, embedding, and batched
//! upserts into the vector store.

pub mod batch;
pub mod collection;
pub mod dedup;
pub mod embed;
pub mod enrich;
pub mod normalize;
pub mod quality;
pub mod reader;
pub mod reconcile;
pub mod report;
pub mod run;
pub mod screen;
mod service;
pub mod types;

pub use batch::{BatchOutcome, BatchState, BatchUpserter};
pub use collection::{CollectionSetup, ensure_collection};
pub use dedup::DedupTracker;
pub use embed::EmbeddingAdapter;
pub use enrich::Enrichment;
pub use quality::{QualityVerdict, RejectionReason, validate};
pub use reader::InputSource;
pub use reconcile::{Reconciliation, reconcile};
pub use report::{RunReport, SourceReport};
pub use run::{Cancellation, CancellationSignal, IngestionRun};
pub use screen::audit_sources;
pub use service::{IndexingPipeline, PreparedCollection};
pub use types::{
    AcceptedRecord, EmbedError, EmbeddedRecord, NormalizedRecord, PipelineSettings,
    ProcessingError, RawRecord, RetryPolicy,
};
