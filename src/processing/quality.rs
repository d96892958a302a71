//! Accept/reject rules applied to normalized records before embedding.
//!
//! Rules run in a fixed order and the first violation wins, so an operator can tell
//! "missing title" apart from "title too short" or "looks like a retraction notice".

use super::types::{AcceptedRecord, NormalizedRecord};
use serde::Serialize;
use std::fmt;
use time::{Date, Month, OffsetDateTime};

const MIN_TITLE_CHARS: usize = 5;
const MIN_TITLE_CHARS_WITHOUT_ABSTRACT: usize = 15;
const MIN_ABSTRACT_CHARS: usize = 30;
const SHORT_ABSTRACT_CHARS: usize = 50;
const SHORT_TITLE_CHARS: usize = 20;
const EARLIEST_YEAR: i32 = 1960;
const FUTURE_YEARS_ALLOWED: i32 = 2;

const PLACEHOLDER_TITLES: &[&str] = &[
    "undefined",
    "null",
    "none",
    "unknown",
    "[no title]",
    "no title",
    "untitled",
];

const LOW_QUALITY_INDICATORS: &[&str] = &[
    "retraction",
    "retracted",
    "withdrawal",
    "withdrawn",
    "erratum",
    "corrigendum",
    "expression of concern",
    "notice of",
    "editorial note",
    "comment on",
];

/// Machine-readable reason a record was refused, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Identifier is empty.
    MissingId,
    /// Title is empty.
    MissingTitle,
    /// Title has fewer than five characters.
    TitleTooShort,
    /// Title is a placeholder token such as `untitled`.
    PlaceholderTitle,
    /// Abstract is empty and the title is too short to stand alone.
    NoAbstractShortTitle,
    /// Abstract is present but shorter than thirty characters.
    AbstractTooShort,
    /// Publication date lies more than two years in the future.
    FutureDate,
    /// Publication date precedes 1960.
    DateTooOld,
    /// Title looks like a retraction, erratum, or other notice.
    LowQuality,
}

impl RejectionReason {
    /// Stable reason code used in logs and run reports.
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingId => "missing_id",
            Self::MissingTitle => "missing_title",
            Self::TitleTooShort => "title_too_short",
            Self::PlaceholderTitle => "placeholder_title",
            Self::NoAbstractShortTitle => "no_abstract_short_title",
            Self::AbstractTooShort => "abstract_too_short",
            Self::FutureDate => "future_date",
            Self::DateTooOld => "date_too_old",
            Self::LowQuality => "low_quality",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of [`validate`]: accepted, or the first rule the record broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityVerdict {
    reason: Option<RejectionReason>,
}

impl QualityVerdict {
    /// Whether the record passed every rule.
    pub fn is_accepted(&self) -> bool {
        self.reason.is_none()
    }

    /// First violated rule, if any.
    pub fn reason(&self) -> Option<RejectionReason> {
        self.reason
    }

    /// Reason code, empty when accepted.
    pub fn reason_code(&self) -> &'static str {
        self.reason.map_or("", RejectionReason::code)
    }
}

/// Validate a record against today's UTC date.
pub fn validate(record: &NormalizedRecord) -> QualityVerdict {
    validate_at(record, OffsetDateTime::now_utc().date())
}

/// Validate a record with an explicit reference date for the future-date rule.
pub fn validate_at(record: &NormalizedRecord, today: Date) -> QualityVerdict {
    QualityVerdict {
        reason: first_violation(record, today),
    }
}

/// Run the gate and, on success, wrap the record as accepted.
pub fn accept(record: NormalizedRecord) -> Result<AcceptedRecord, RejectionReason> {
    accept_at(record, OffsetDateTime::now_utc().date())
}

/// [`accept`] with an explicit reference date.
pub fn accept_at(record: NormalizedRecord, today: Date) -> Result<AcceptedRecord, RejectionReason> {
    match first_violation(&record, today) {
        Some(reason) => Err(reason),
        None => Ok(AcceptedRecord(record)),
    }
}

fn first_violation(record: &NormalizedRecord, today: Date) -> Option<RejectionReason> {
    let title = record.title.trim();
    let abstract_text = record.abstract_text.trim();
    let title_chars = title.chars().count();
    let abstract_chars = abstract_text.chars().count();

    if record.id.trim().is_empty() {
        return Some(RejectionReason::MissingId);
    }
    if title.is_empty() {
        return Some(RejectionReason::MissingTitle);
    }
    if title_chars < MIN_TITLE_CHARS {
        return Some(RejectionReason::TitleTooShort);
    }
    let lowered_title = title.to_lowercase();
    if PLACEHOLDER_TITLES.contains(&lowered_title.as_str()) {
        return Some(RejectionReason::PlaceholderTitle);
    }
    if abstract_text.is_empty() && title_chars < MIN_TITLE_CHARS_WITHOUT_ABSTRACT {
        return Some(RejectionReason::NoAbstractShortTitle);
    }
    if !abstract_text.is_empty() && abstract_chars < MIN_ABSTRACT_CHARS {
        return Some(RejectionReason::AbstractTooShort);
    }
    if let Some(published) = record.published {
        if published > latest_allowed(today) {
            return Some(RejectionReason::FutureDate);
        }
        if published.year() < EARLIEST_YEAR {
            return Some(RejectionReason::DateTooOld);
        }
    }
    let indicator_hit = LOW_QUALITY_INDICATORS
        .iter()
        .any(|indicator| lowered_title.contains(indicator));
    let terse = !abstract_text.is_empty()
        && abstract_chars < SHORT_ABSTRACT_CHARS
        && title_chars < SHORT_TITLE_CHARS;
    if indicator_hit || terse {
        return Some(RejectionReason::LowQuality);
    }
    None
}

fn latest_allowed(today: Date) -> Date {
    let year = today.year() + FUTURE_YEARS_ALLOWED;
    Date::from_calendar_date(year, today.month(), today.day())
        // 29 February rolls back to the 28th.
        .or_else(|_| Date::from_calendar_date(year, Month::February, 28))
        .unwrap_or(Date::MAX)
}
