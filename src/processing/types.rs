//! Core data types and error definitions for the indexing pipeline.

use crate::{
    config::Config,
    embedding::EmbeddingClientError,
    store::StoreError,
};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use thiserror::Error;
use time::Date;

/// Bibliographic entry exactly as it arrives on an input line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    /// Natural key.
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// PubMed identifier, used when `id` is absent.
    #[serde(default, deserialize_with = "string_or_number")]
    pub pmid: String,
    /// Article title, possibly containing markup.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// Abstract text, possibly containing markup.
    #[serde(default, rename = "abstract", deserialize_with = "null_as_default")]
    pub abstract_text: String,
    /// Author list in any of the shapes producers emit.
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: RawAuthors,
    /// Publication date (`YYYY-MM-DD`, `YYYY-M-D`, or RFC 3339).
    #[serde(default, deserialize_with = "null_as_default")]
    pub published_date: String,
    /// Digital object identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub doi: String,
    /// Journal title.
    #[serde(default, deserialize_with = "null_as_default")]
    pub journal: String,
    /// ISO journal abbreviation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub journal_abbr: String,
    /// Producer tag such as `pubmed`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    /// MeSH subject headings.
    #[serde(default, deserialize_with = "null_as_default")]
    pub mesh_headings: Vec<String>,
    /// Publication types such as `Randomized Controlled Trial`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub publication_types: Vec<String>,
}

/// Author field as emitted by the different producers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAuthors {
    /// Pre-formatted author string.
    Text(String),
    /// One entry per author.
    List(Vec<RawAuthor>),
}

impl Default for RawAuthors {
    fn default() -> Self {
        RawAuthors::List(Vec::new())
    }
}

/// Single author entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAuthor {
    /// Plain display name.
    Name(String),
    /// Structured name parts.
    Structured {
        /// Family name.
        #[serde(default)]
        last_name: String,
        /// Given names.
        #[serde(default)]
        fore_name: String,
        /// Initials of the given names.
        #[serde(default)]
        initials: String,
        /// Display name, preferred when present.
        #[serde(default)]
        full_name: String,
    },
}

impl RawRecord {
    /// Identifier used for deduplication and point identity.
    pub fn identifier(&self) -> &str {
        let id = self.id.trim();
        if id.is_empty() { self.pmid.trim() } else { id }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Identifier {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match Option::<Identifier>::deserialize(deserializer)? {
        Some(Identifier::Text(text)) => text,
        Some(Identifier::Unsigned(value)) => value.to_string(),
        Some(Identifier::Signed(value)) => value.to_string(),
        None => String::new(),
    })
}

/// Record after markup stripping, character filtering, and abbreviation expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    /// Trimmed identifier.
    pub id: String,
    /// Cleaned title.
    pub title: String,
    /// Cleaned abstract with clinical abbreviations expanded.
    pub abstract_text: String,
    /// Authors rendered as `A, B and C`.
    pub authors: String,
    /// Parsed publication date, absent when missing or unparseable.
    pub published: Option<Date>,
    /// Validated DOI without resolver prefix.
    pub doi: Option<String>,
    /// Cleaned journal title.
    pub journal: String,
    /// Journal abbreviation.
    pub journal_abbr: String,
    /// Producer tag, falling back to the input source name.
    pub source: String,
    /// Trimmed, non-empty MeSH headings.
    pub mesh_headings: Vec<String>,
    /// Trimmed, non-empty publication types.
    pub publication_types: Vec<String>,
}

impl NormalizedRecord {
    /// Text sent to the embedding service: title followed by abstract.
    pub fn embedding_text(&self) -> String {
        if self.abstract_text.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.abstract_text)
        }
    }
}

/// Normalized record that passed the quality gate.
///
/// Only [`crate::processing::quality::accept`] constructs this type.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedRecord(pub(crate) NormalizedRecord);

impl AcceptedRecord {
    /// Borrow the underlying normalized record.
    pub fn record(&self) -> &NormalizedRecord {
        &self.0
    }

    /// Unwrap into the underlying normalized record.
    pub fn into_inner(self) -> NormalizedRecord {
        self.0
    }
}

/// Accepted record paired with its embedding.
#[derive(Debug, Clone)]
pub struct EmbeddedRecord {
    /// Record that was embedded.
    pub record: AcceptedRecord,
    /// Vector whose length equals the collection dimension.
    pub vector: Vec<f32>,
    /// Exact text that produced the vector.
    pub source_text: String,
}

/// Retry ceiling and backoff for batch upserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number between attempts.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay applied after failed attempt `attempt` (1-based); linear in the attempt number.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Explicit settings handed to [`crate::processing::IndexingPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Target collection.
    pub collection: String,
    /// Points per upsert batch.
    pub batch_size: usize,
    /// Batch retry behavior.
    pub retry: RetryPolicy,
    /// Deadline for each embedding or vector store call.
    pub request_timeout: Duration,
    /// Sources processed at once; each owns its batch buffer.
    pub source_concurrency: usize,
    /// Text embedded at startup to learn the vector dimension.
    pub canary_text: String,
    /// Dimension pinned by the operator; the canary must agree with it.
    pub expected_dimension: Option<usize>,
}

impl PipelineSettings {
    /// Derive pipeline settings from process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.qdrant_collection_name.clone(),
            batch_size: config.index_batch_size.max(1),
            retry: RetryPolicy {
                max_attempts: config.upsert_max_attempts.max(1),
                base_delay: Duration::from_millis(config.upsert_backoff_ms),
            },
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            source_concurrency: config.source_concurrency.max(1),
            canary_text: config.embedding_canary_text.clone(),
            expected_dimension: config.embedding_dimension,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            collection: "medical_abstracts".to_string(),
            batch_size: 10,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            source_concurrency: 1,
            canary_text: "cardiovascular disease treatment".to_string(),
            expected_dimension: None,
        }
    }
}

/// Why the embedding adapter dropped a record.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Provider failed or returned an unusable response.
    #[error("Embedding unavailable: {0}")]
    Unavailable(#[from] EmbeddingClientError),
    /// Provider returned a vector of the wrong length.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Collection dimension.
        expected: usize,
        /// Length of the returned vector.
        actual: usize,
    },
    /// Call exceeded the request deadline.
    #[error("Embedding timed out after {0:?}")]
    TimedOut(Duration),
    /// Run was cancelled while the call was in flight.
    #[error("Embedding cancelled")]
    Cancelled,
}

/// Fatal errors: the run aborts before any source is processed.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Canary embedding failed, so the dimension is unknown.
    #[error("Embedding service probe failed: {0}")]
    EmbeddingProbe(#[source] EmbedError),
    /// Canary dimension disagrees with the configured dimension.
    #[error("Embedding dimension conflict: configured {configured}, service produced {probed}")]
    DimensionConflict {
        /// Dimension from configuration.
        configured: usize,
        /// Dimension observed from the canary.
        probed: usize,
    },
    /// Vector store could not be reached or refused collection setup.
    #[error("Vector store setup failed: {0}")]
    Store(#[from] StoreError),
    /// Setup call to the vector store exceeded the request deadline.
    #[error("Vector store setup timed out after {0:?}")]
    TimedOut(Duration),
    /// Run was cancelled during setup.
    #[error("Run cancelled during setup")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_flat_indexer_document() {
        let line = r#"{"id":"101","title":"Statins and stroke","abstract":"A cohort study.","authors":"Smith J, Doe A","published_date":"2021-3-7","doi":"10.1/abc"}"#;
        let record: RawRecord = serde_json::from_str(line).expect("decode");
        assert_eq!(record.id, "101");
        assert!(matches!(record.authors, RawAuthors::Text(ref s) if s == "Smith J, Doe A"));
        assert_eq!(record.published_date, "2021-3-7");
        assert!(record.mesh_headings.is_empty());
    }

    #[test]
    fn decodes_normalized_article_with_nulls_and_numeric_id() {
        let line = r#"{"pmid":38000001,"title":"T","abstract":null,"authors":[{"last_name":"Ito","fore_name":"Ken","initials":"K","full_name":""},"Jane Smith"],"published_date":"0001-01-01T00:00:00Z","mesh_headings":null,"publication_types":["Review"]}"#;
        let record: RawRecord = serde_json::from_str(line).expect("decode");
        assert_eq!(record.identifier(), "38000001");
        assert_eq!(record.abstract_text, "");
        match record.authors {
            RawAuthors::List(ref authors) => assert_eq!(authors.len(), 2),
            RawAuthors::Text(_) => panic!("expected list"),
        }
        assert_eq!(record.publication_types, vec!["Review".to_string()]);
    }

    #[test]
    fn missing_identifier_decodes_empty() {
        let record: RawRecord = serde_json::from_str(r#"{"title":"Only a title"}"#).expect("decode");
        assert!(record.identifier().is_empty());
    }

    #[test]
    fn id_and_pmid_may_both_be_present() {
        let line = r#"{"id":"","pmid":"555","title":"Both keys present"}"#;
        let record: RawRecord = serde_json::from_str(line).expect("decode");
        assert_eq!(record.identifier(), "555");
    }

    #[test]
    fn retry_delay_grows_linearly() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert!(policy.delay_after(3) >= policy.delay_after(2));
    }
}
