//! Derived payload fields computed from accepted records.

use super::types::NormalizedRecord;
use std::collections::HashSet;

const MIN_CONCEPT_CHARS: usize = 4;

const CONCEPT_VOCABULARY: &[&str] = &[
    // conditions
    "diabetes", "cancer", "hypertension", "arthritis", "asthma", "migraine", "depression",
    "anxiety", "osteoporosis", "alzheimer", "parkinson", "epilepsy", "schizophrenia",
    "fibromyalgia", "lupus", "crohn", "colitis", "hepatitis", "aids", "tuberculosis",
    "malaria", "pneumonia", "bronchitis", "emphysema", "copd",
    // symptoms
    "pain", "fever", "fatigue", "nausea", "vomiting", "headache", "dizziness", "rash",
    "swelling", "inflammation", "bleeding", "palpitations", "numbness", "weakness",
    // treatments and procedures
    "surgery", "chemotherapy", "radiotherapy", "immunotherapy", "medication", "antibiotics",
    "antiviral", "antifungal", "vaccine", "transplant", "dialysis", "biopsy", "endoscopy",
    "colonoscopy", "x-ray", "ultrasound",
    // body systems
    "cardiac", "pulmonary", "neurological", "gastrointestinal", "renal", "hepatic",
    "endocrine", "musculoskeletal", "dermatological", "ophthalmological", "otolaryngological",
    "psychological", "immunological", "hematological",
    // specialties
    "oncology", "cardiology", "neurology", "psychiatry", "pediatrics", "geriatrics",
    "radiology", "pathology", "pharmacology", "epidemiology", "toxicology", "dermatology",
    "endocrinology", "gastroenterology", "nephrology", "pulmonology", "rheumatology",
    "urology",
];

const MEDICAL_INDICATORS: &[&str] = &[
    "patient", "treatment", "therapy", "diagnosis", "clinical", "medical", "disease",
    "symptom", "procedure", "surgery", "medication", "drug", "hospital", "clinic", "doctor",
    "physician", "nurse", "health", "illness", "disorder", "syndrome", "infection",
    "inflammatory", "cardiac", "pulmonary", "neurological", "gastrointestinal", "renal",
    "hepatic", "endocrine", "musculoskeletal", "dermatological", "operation", "transplant",
    "biopsy", "scan", "test", "imaging", "injection", "infusion", "transfusion", "dialysis",
    "antibiotic", "antiviral", "antifungal", "anti-inflammatory", "analgesic",
    "antidepressant", "antipsychotic", "vaccine",
];

const CLINICAL_PUBLICATION_TYPES: &[&str] = &[
    "Clinical Trial",
    "Randomized Controlled Trial",
    "Clinical Study",
    "Case Report",
    "Case Series",
    "Observational Study",
];

const CLINICAL_INDICATORS: &[&str] = &[
    "clinical trial",
    "randomized",
    "controlled study",
    "patient cohort",
    "treatment group",
    "placebo",
    "double-blind",
    "follow-up",
];

const WORD_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}',
];

/// Payload fields derived from a record's text and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    /// Vocabulary terms found in title and abstract, first occurrence order.
    pub key_concepts: Vec<String>,
    /// Whether any medical indicator appears in title or abstract.
    pub has_medical_terms: bool,
    /// Whether the record reads as a clinical study.
    pub clinical_study: bool,
}

impl Enrichment {
    /// Compute every derived field for `record`.
    pub fn for_record(record: &NormalizedRecord) -> Self {
        let text = record.embedding_text();
        Self {
            key_concepts: key_concepts(&text),
            has_medical_terms: has_medical_terms(&text),
            clinical_study: is_clinical_study(record),
        }
    }
}

/// Vocabulary terms present in `text`, deduplicated case-insensitively, original casing kept.
pub fn key_concepts(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .filter_map(|word| {
            let trimmed = word.trim_matches(WORD_PUNCTUATION);
            let lowered = trimmed.to_lowercase();
            let known = lowered.chars().count() >= MIN_CONCEPT_CHARS
                && CONCEPT_VOCABULARY.contains(&lowered.as_str());
            (known && seen.insert(lowered)).then(|| trimmed.to_string())
        })
        .collect()
}

/// Whether `text` mentions any medical indicator.
pub fn has_medical_terms(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    MEDICAL_INDICATORS
        .iter()
        .any(|indicator| lowered.contains(indicator))
}

/// Whether the record is typed as, or describes itself as, a clinical study.
pub fn is_clinical_study(record: &NormalizedRecord) -> bool {
    let typed = record.publication_types.iter().any(|kind| {
        CLINICAL_PUBLICATION_TYPES
            .iter()
            .any(|clinical| kind.eq_ignore_ascii_case(clinical))
    });
    if typed {
        return true;
    }
    let lowered = record.abstract_text.to_lowercase();
    CLINICAL_INDICATORS
        .iter()
        .any(|indicator| lowered.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(abstract_text: &str, publication_types: &[&str]) -> NormalizedRecord {
        NormalizedRecord {
            id: "1".into(),
            title: "Cardiac outcomes".into(),
            abstract_text: abstract_text.into(),
            authors: "Unknown Author".into(),
            published: None,
            doi: None,
            journal: String::new(),
            journal_abbr: String::new(),
            source: "test".into(),
            mesh_headings: Vec::new(),
            publication_types: publication_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn concepts_keep_first_casing_and_skip_repeats() {
        let concepts = key_concepts("Asthma, pain and ASTHMA (Oncology) rash copd");
        assert_eq!(concepts, vec!["Asthma", "pain", "Oncology", "rash", "copd"]);
        assert!(key_concepts("").is_empty());
    }

    #[test]
    fn medical_terms_are_substring_matches() {
        assert!(has_medical_terms("Outpatient follow-up"));
        assert!(!has_medical_terms("Quarterly revenue grew"));
        assert!(!has_medical_terms(""));
    }

    #[test]
    fn clinical_study_by_type_or_phrase() {
        assert!(is_clinical_study(&record("", &["randomized controlled trial"])));
        assert!(is_clinical_study(&record("A double-blind comparison.", &["Review"])));
        assert!(!is_clinical_study(&record("A narrative overview.", &["Review"])));
    }

    #[test]
    fn enrichment_covers_title_and_abstract() {
        let enrichment = Enrichment::for_record(&record("Placebo arm with fever.", &[]));
        assert_eq!(enrichment.key_concepts, vec!["Cardiac", "fever"]);
        assert!(enrichment.has_medical_terms);
        assert!(enrichment.clinical_study);
    }
}
