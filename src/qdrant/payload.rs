//! Helpers for constructing Qdrant payloads and point identifiers.

use crate::processing::{Enrichment, NormalizedRecord};
use crate::store::PointId;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed article.
pub fn build_payload(record: &NormalizedRecord, enrichment: &Enrichment) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("article_id".into(), Value::String(record.id.clone()));
    payload.insert("title".into(), Value::String(record.title.clone()));
    payload.insert(
        "abstract".into(),
        Value::String(record.abstract_text.clone()),
    );
    payload.insert("authors".into(), Value::String(record.authors.clone()));
    payload.insert("journal".into(), Value::String(record.journal.clone()));
    payload.insert("source".into(), Value::String(record.source.clone()));

    if let Some(date) = record.published
        && let Ok(formatted) = date.format(format_description!("[year]-[month]-[day]"))
    {
        payload.insert("published_date".into(), Value::String(formatted));
    }

    if let Some(doi) = record.doi.as_ref() {
        payload.insert("doi".into(), Value::String(doi.clone()));
    }

    if !record.journal_abbr.is_empty() {
        payload.insert(
            "journal_abbr".into(),
            Value::String(record.journal_abbr.clone()),
        );
    }

    payload.insert("mesh_headings".into(), string_array(&record.mesh_headings));
    payload.insert(
        "publication_types".into(),
        string_array(&record.publication_types),
    );
    payload.insert("key_concepts".into(), string_array(&enrichment.key_concepts));
    payload.insert(
        "has_medical_terms".into(),
        Value::Bool(enrichment.has_medical_terms),
    );
    payload.insert(
        "clinical_study".into(),
        Value::Bool(enrichment.clinical_study),
    );
    payload.insert(
        "indexed_at".into(),
        Value::String(current_timestamp_rfc3339()),
    );

    payload
}

/// Map a record identifier onto a stable point identifier.
///
/// Canonical decimal identifiers (PMIDs: digits only, no sign, no leading zero) become
/// numeric ids. Anything else, including `007` or `+7`, becomes a UUID built from the
/// first 16 bytes of the identifier's SHA-256 digest. Distinct identifiers never share a
/// point, and re-indexing overwrites in place.
pub fn derive_point_id(identifier: &str) -> PointId {
    if let Some(number) = canonical_number(identifier) {
        return PointId::Num(number);
    }

    let digest = Sha256::digest(identifier.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    PointId::Uuid(Uuid::from_bytes(bytes))
}

fn canonical_number(identifier: &str) -> Option<u64> {
    let digits_only = !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit());
    let leading_zero = identifier.len() > 1 && identifier.starts_with('0');
    if !digits_only || leading_zero {
        return None;
    }
    identifier.parse().ok()
}

fn string_array(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
