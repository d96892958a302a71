//! Normalization, dedup, and quality gating of decoded records.

use super::dedup::DedupTracker;
use super::normalize::normalize_record;
use super::quality::{RejectionReason, accept};
use super::reader::{InputSource, SourceLine, SourceReader};
use super::report::SourceReport;
use super::types::{AcceptedRecord, RawRecord};

/// Where a decoded record ended up after screening.
#[derive(Debug)]
pub enum Screened {
    /// Identifier already consumed earlier in the run.
    Duplicate(String),
    /// Refused by the quality gate.
    Rejected {
        /// Identifier, possibly empty.
        id: String,
        /// First rule the record broke.
        reason: RejectionReason,
    },
    /// Ready for embedding.
    Accepted(AcceptedRecord),
}

/// Normalize `raw`, claim its identifier in `dedup`, then run the quality gate.
///
/// The identifier is claimed before gating, so a later copy of a rejected record is still
/// counted as a duplicate. Records without an identifier skip the dedup set and are
/// rejected by the gate.
pub fn screen(raw: RawRecord, source: &str, dedup: &DedupTracker) -> Screened {
    let record = normalize_record(raw, source);
    if !record.id.is_empty() && !dedup.check_and_mark(&record.id) {
        return Screened::Duplicate(record.id);
    }
    let id = record.id.clone();
    match accept(record) {
        Ok(accepted) => Screened::Accepted(accepted),
        Err(reason) => Screened::Rejected { id, reason },
    }
}

/// Read, decode, and screen every source without embedding or writing anything.
///
/// Dedup spans all sources, as in a full run.
pub async fn audit_sources(sources: &[InputSource]) -> Vec<SourceReport> {
    let dedup = DedupTracker::new();
    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        reports.push(audit_source(source, &dedup).await);
    }
    reports
}

async fn audit_source(source: &InputSource, dedup: &DedupTracker) -> SourceReport {
    let name = source.name();
    let mut report = SourceReport::new(name.clone());
    let mut reader = match SourceReader::open(source).await {
        Ok(reader) => reader,
        Err(err) => {
            tracing::error!(source = %name, error = %err, "Failed to open source");
            report.error = Some(err.to_string());
            return report;
        }
    };

    loop {
        let line = match reader.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(source = %name, error = %err, "Failed to read source");
                report.error = Some(err.to_string());
                break;
            }
        };
        report.lines_read += 1;
        match line {
            SourceLine::Malformed { line, error } => {
                tracing::warn!(source = %name, line, error = %error, "Skipping malformed line");
                report.malformed += 1;
            }
            SourceLine::Record { record, .. } => match screen(record, &name, dedup) {
                Screened::Duplicate(_) => report.duplicates += 1,
                Screened::Rejected { reason, .. } => report.record_rejection(reason),
                Screened::Accepted(_) => report.accepted += 1,
            },
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, title: &str) -> RawRecord {
        RawRecord {
            id: id.into(),
            title: title.into(),
            abstract_text: "Adults with atrial fibrillation were followed for stroke.".into(),
            ..Default::default()
        }
    }

    #[test]
    fn duplicate_check_precedes_gate() {
        let dedup = DedupTracker::new();
        assert!(matches!(
            screen(raw("5", "Retraction: study X"), "a", &dedup),
            Screened::Rejected {
                reason: RejectionReason::LowQuality,
                ..
            }
        ));
        assert!(matches!(
            screen(raw("5", "Anticoagulation in atrial fibrillation"), "b", &dedup),
            Screened::Duplicate(ref id) if id == "5"
        ));
    }

    #[test]
    fn empty_identifiers_are_not_deduplicated() {
        let dedup = DedupTracker::new();
        for _ in 0..2 {
            assert!(matches!(
                screen(raw("", "Anticoagulation in atrial fibrillation"), "a", &dedup),
                Screened::Rejected {
                    reason: RejectionReason::MissingId,
                    ..
                }
            ));
        }
        assert!(dedup.is_empty());
    }

    #[tokio::test]
    async fn audit_tallies_every_outcome_across_sources() {
        let first = InputSource::inline(
            "first",
            concat!(
                "{\"id\":\"1\",\"title\":\"Statins after ischemic stroke\",\"abstract\":\"A cohort of adults followed for recurrent vascular events.\"}\n",
                "{\"id\":\"2\",\"title\":\"Untitled\",\"abstract\":\"A cohort of adults followed for recurrent vascular events.\"}\n",
                "{broken\n",
            ),
        );
        let second = InputSource::inline(
            "second",
            "{\"id\":\"1\",\"title\":\"Statins after ischemic stroke\",\"abstract\":\"A cohort of adults followed for recurrent vascular events.\"}\n",
        );
        let reports = audit_sources(&[first, second]).await;
        assert_eq!(reports[0].accepted, 1);
        assert_eq!(reports[0].rejections.get("placeholder_title"), Some(&1));
        assert_eq!(reports[0].malformed, 1);
        assert_eq!(reports[0].lines_read, 3);
        assert_eq!(reports[1].duplicates, 1);
        assert_eq!(reports[1].accepted, 0);
    }
}
