//! Text cleaning and canonicalization for raw article records.
//!
//! `normalize_text` strips markup, replaces characters outside the allow-list (word
//! characters, whitespace and `-.,()&/`) with spaces, collapses whitespace, and trims.
//! The output never contains `<`, `>` or `;`, so a second pass finds no tags and no
//! entities to decode: the function is idempotent.
//!
//! `expand_abbreviations` rewrites clinical abbreviations in a single left-to-right pass
//! over one alternation pattern. Keys are regex-escaped and ordered longest first, so
//! `PT/INR` wins over `PT` and `CA-125` over `CA`, and expansions are never re-scanned.
//! Expansions only use allow-listed characters and contain no keys, so a normalized
//! abstract survives another normalization pass unchanged.

use super::types::{NormalizedRecord, RawAuthor, RawAuthors, RawRecord};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;
use time::format_description::well_known::Rfc3339;
use time::{Date, Month, OffsetDateTime};

const UNKNOWN_AUTHOR: &str = "Unknown Author";

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("PT therapy", "Physical Therapy"),
    ("PT time", "Prothrombin Time"),
    ("PT/INR", "Prothrombin Time/International Normalized Ratio"),
    ("MRI", "Magnetic Resonance Imaging"),
    ("CT", "Computed Tomography"),
    ("PET", "Positron Emission Tomography"),
    ("AI", "Artificial Intelligence"),
    ("NLP", "Natural Language Processing"),
    ("ER", "Emergency Room"),
    ("ED", "Emergency Department"),
    ("DNA", "Deoxyribonucleic Acid"),
    ("RNA", "Ribonucleic Acid"),
    ("COVID-19", "Coronavirus Disease 2019"),
    ("HIV", "Human Immunodeficiency Virus"),
    ("AIDS", "Acquired Immunodeficiency Syndrome"),
    ("FDA", "Food and Drug Administration"),
    ("NIH", "National Institutes of Health"),
    ("WHO", "World Health Organization"),
    ("CDC", "Centers for Disease Control and Prevention"),
    ("ECG", "Electrocardiogram"),
    ("EEG", "Electroencephalogram"),
    ("EMG", "Electromyography"),
    ("ICU", "Intensive Care Unit"),
    ("OR", "Operating Room"),
    ("OT", "Occupational Therapy"),
    ("Rx", "Prescription"),
    ("Dx", "Diagnosis"),
    ("Tx", "Treatment"),
    ("Hx", "History"),
    ("Sx", "Symptoms"),
    ("RO", "Rule Out"),
    ("SOB", "Shortness of Breath"),
    ("CP", "Chest Pain"),
    ("HA", "Headache"),
    ("HTN", "Hypertension"),
    ("DM", "Diabetes Mellitus"),
    ("CAD", "Coronary Artery Disease"),
    ("CHF", "Congestive Heart Failure"),
    ("COPD", "Chronic Obstructive Pulmonary Disease"),
    ("ARDS", "Acute Respiratory Distress Syndrome"),
    ("DVT", "Deep Vein Thrombosis"),
    ("PE", "Pulmonary Embolism"),
    ("MI", "Myocardial Infarction"),
    ("CVA", "Cerebrovascular Accident"),
    ("TIA", "Transient Ischemic Attack"),
    ("GBS", "Guillain-Barré Syndrome"),
    ("MS", "Multiple Sclerosis"),
    ("ALS", "Amyotrophic Lateral Sclerosis"),
    ("PD", "Parkinson Disease"),
    ("AD", "Alzheimer Disease"),
    ("RA", "Rheumatoid Arthritis"),
    ("SLE", "Systemic Lupus Erythematosus"),
    ("IBD", "Inflammatory Bowel Disease"),
    ("IBS", "Irritable Bowel Syndrome"),
    ("GERD", "Gastroesophageal Reflux Disease"),
    ("PUD", "Peptic Ulcer Disease"),
    ("CKD", "Chronic Kidney Disease"),
    ("ESRD", "End Stage Renal Disease"),
    ("UTI", "Urinary Tract Infection"),
    ("STI", "Sexually Transmitted Infection"),
    ("PID", "Pelvic Inflammatory Disease"),
    ("OCP", "Oral Contraceptive Pill"),
    ("IUD", "Intrauterine Device"),
    ("HRT", "Hormone Replacement Therapy"),
    ("BRCA", "Breast Cancer gene"),
    ("PSA", "Prostate-Specific Antigen"),
    ("CEA", "Carcinoembryonic Antigen"),
    ("AFP", "Alpha-Fetoprotein"),
    ("CA", "Cancer"),
    ("CA-125", "Cancer Antigen 125"),
    ("CA-19-9", "Cancer Antigen 19-9"),
    ("WBC", "White Blood Cell"),
    ("RBC", "Red Blood Cell"),
    ("HGB", "Hemoglobin"),
    ("HCT", "Hematocrit"),
    ("PLT", "Platelet"),
    ("INR", "International Normalized Ratio"),
    ("PTT", "Partial Thromboplastin Time"),
    ("ALT", "Alanine Aminotransferase"),
    ("AST", "Aspartate Aminotransferase"),
    ("ALP", "Alkaline Phosphatase"),
    ("GGT", "Gamma-Glutamyl Transferase"),
    ("BUN", "Blood Urea Nitrogen"),
    ("Cr", "Creatinine"),
    ("Na", "Sodium"),
    ("K", "Potassium"),
    ("Cl", "Chloride"),
    ("CO2", "Carbon Dioxide"),
    ("Ca", "Calcium"),
    ("Mg", "Magnesium"),
    ("PO4", "Phosphate"),
    ("LFT", "Liver Function Test"),
    ("BMP", "Basic Metabolic Panel"),
    ("CMP", "Comprehensive Metabolic Panel"),
    ("CBC", "Complete Blood Count"),
    ("ABG", "Arterial Blood Gas"),
    ("VQ", "Ventilation-Perfusion"),
    ("CPR", "Cardiopulmonary Resuscitation"),
    ("ACLS", "Advanced Cardiac Life Support"),
    ("PALS", "Pediatric Advanced Life Support"),
    ("BLS", "Basic Life Support"),
    ("CCU", "Coronary Care Unit"),
    ("PICU", "Pediatric Intensive Care Unit"),
    ("NICU", "Neonatal Intensive Care Unit"),
    ("SICU", "Surgical Intensive Care Unit"),
    ("MICU", "Medical Intensive Care Unit"),
    ("ERCP", "Endoscopic Retrograde Cholangiopancreatography"),
    ("EGD", "Esophagogastroduodenoscopy"),
    ("COLON", "Colonoscopy"),
    ("EUS", "Endoscopic Ultrasound"),
    ("US", "Ultrasound"),
    ("USG", "Ultrasonography"),
];

fn markup_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<[^>]*>").expect("markup pattern compiles"))
}

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(amp|lt|gt|quot|apos|nbsp|#39);").expect("entity pattern compiles")
    })
}

fn disallowed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[^\w\s\-.,()&/]").expect("allow-list pattern compiles")
    })
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern compiles"))
}

fn doi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").expect("doi pattern compiles"))
}

struct AbbreviationTable {
    pattern: Regex,
    expansions: HashMap<&'static str, &'static str>,
}

fn abbreviation_table() -> &'static AbbreviationTable {
    static TABLE: OnceLock<AbbreviationTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut keys: Vec<&str> = ABBREVIATIONS.iter().map(|(key, _)| *key).collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"\b(?:{alternation})\b"))
            .expect("escaped abbreviation keys compile");
        AbbreviationTable {
            pattern,
            expansions: ABBREVIATIONS.iter().copied().collect(),
        }
    })
}

/// Strip markup and non-semantic characters, collapse whitespace, and trim.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let without_tags = markup_pattern().replace_all(text, " ");
    let decoded = entity_pattern().replace_all(&without_tags, |caps: &Captures<'_>| {
        match &caps[1] {
            "amp" => "&",
            "lt" => "<",
            "gt" => ">",
            "quot" => "\"",
            "apos" | "#39" => "'",
            _ => " ",
        }
        .to_string()
    });
    let allowed = disallowed_pattern().replace_all(&decoded, " ");
    let collapsed = whitespace_pattern().replace_all(&allowed, " ");
    collapsed.trim().to_string()
}

/// Rewrite recognized clinical abbreviations to their expansions on whole-token boundaries.
pub fn expand_abbreviations(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let table = abbreviation_table();
    table
        .pattern
        .replace_all(text, |caps: &Captures<'_>| {
            let matched = &caps[0];
            table
                .expansions
                .get(matched)
                .copied()
                .unwrap_or(matched)
                .to_string()
        })
        .into_owned()
}

/// Parse the publication date formats producers emit.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD` (zero padding optional, month names allowed),
/// `YYYY-MM` and `YYYY`. Zero timestamps (year 1) and anything unparseable yield `None`.
pub fn parse_published_date(value: &str) -> Option<Date> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(timestamp) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        let date = timestamp.date();
        return (date.year() > 1).then_some(date);
    }

    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    let mut parts = date_part.split('-');
    let year: i32 = parts.next()?.trim().parse().ok()?;
    let month = match parts.next() {
        Some(raw) => parse_month(raw)?,
        None => Month::January,
    };
    let day: u8 = match parts.next() {
        Some(raw) => raw.trim().parse().ok()?,
        None => 1,
    };
    if parts.next().is_some() || year <= 1 {
        return None;
    }
    Date::from_calendar_date(year, month, day).ok()
}

fn parse_month(raw: &str) -> Option<Month> {
    let raw = raw.trim();
    if let Ok(number) = raw.parse::<u8>() {
        return Month::try_from(number).ok();
    }
    let prefix: String = raw.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => Month::January,
        "feb" => Month::February,
        "mar" => Month::March,
        "apr" => Month::April,
        "may" => Month::May,
        "jun" => Month::June,
        "jul" => Month::July,
        "aug" => Month::August,
        "sep" => Month::September,
        "oct" => Month::October,
        "nov" => Month::November,
        "dec" => Month::December,
        _ => return None,
    };
    Some(month)
}

/// Render authors as `A, B and C`.
pub fn format_authors(authors: &RawAuthors) -> String {
    match authors {
        RawAuthors::Text(text) => {
            let collapsed = whitespace_pattern().replace_all(text.trim(), " ");
            if collapsed.is_empty() {
                UNKNOWN_AUTHOR.to_string()
            } else {
                collapsed.into_owned()
            }
        }
        RawAuthors::List(list) if list.is_empty() => UNKNOWN_AUTHOR.to_string(),
        RawAuthors::List(list) => {
            let mut rendered = String::new();
            for (idx, author) in list.iter().enumerate() {
                if idx > 0 {
                    rendered.push_str(if idx == list.len() - 1 { " and " } else { ", " });
                }
                rendered.push_str(&author_name(author));
            }
            rendered
        }
    }
}

fn author_name(author: &RawAuthor) -> String {
    match author {
        RawAuthor::Name(name) if !name.trim().is_empty() => name.trim().to_string(),
        RawAuthor::Name(_) => UNKNOWN_AUTHOR.to_string(),
        RawAuthor::Structured {
            last_name,
            fore_name,
            full_name,
            ..
        } => {
            let (last, fore, full) = (last_name.trim(), fore_name.trim(), full_name.trim());
            if !full.is_empty() {
                full.to_string()
            } else if !last.is_empty() && !fore.is_empty() {
                format!("{fore} {last}")
            } else if !last.is_empty() {
                last.to_string()
            } else {
                UNKNOWN_AUTHOR.to_string()
            }
        }
    }
}

/// Strip resolver prefixes and validate the DOI shape.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if doi.len() >= prefix.len() && doi[..prefix.len()].eq_ignore_ascii_case(prefix) {
            doi = doi[prefix.len()..].trim();
            break;
        }
    }
    doi_pattern().is_match(doi).then(|| doi.to_string())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// Clean every text field of a raw record.
///
/// `fallback_source` names the input source and is used when the record carries no tag.
pub fn normalize_record(raw: RawRecord, fallback_source: &str) -> NormalizedRecord {
    let id = raw.identifier().to_string();
    let source = match raw.source.trim() {
        "" => fallback_source.to_string(),
        tag => tag.to_string(),
    };
    let doi = normalize_doi(&raw.doi);
    if doi.is_none() && !raw.doi.trim().is_empty() {
        tracing::debug!(id = %id, doi = %raw.doi, "Dropping malformed DOI");
    }

    NormalizedRecord {
        title: normalize_text(&raw.title),
        abstract_text: expand_abbreviations(&normalize_text(&raw.abstract_text)),
        authors: format_authors(&raw.authors),
        published: parse_published_date(&raw.published_date),
        doi,
        journal: normalize_text(&raw.journal),
        journal_abbr: raw.journal_abbr.trim().to_string(),
        source,
        mesh_headings: clean_list(raw.mesh_headings),
        publication_types: clean_list(raw.publication_types),
        id,
    }
}
