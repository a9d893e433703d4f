//! Document type classification.
//!
//! Three layers, first hit wins:
//! 1. a type keyword at the start of a line near the top of the document,
//! 2. the same keyword sets over the full text, most specific type first,
//! 3. an inference call constrained to the closed label set.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::document_type::DocumentType;
use crate::inference::InferenceBackend;

/// How much of the document counts as its heading.
const HEADING_CHARS: usize = 300;

/// Text shown to the backend when keywords fail.
const PROMPT_TEXT_CHARS: usize = 1500;

/// Keyword sets in priority order. Specific types come first because their
/// documents routinely contain the generic words too (a UTD mentions the
/// contract, a tax invoice is also a "счет").
static RULES: LazyLock<Vec<(DocumentType, Vec<Regex>)>> = LazyLock::new(|| {
    let rule = |doc_type: DocumentType, patterns: &[&str]| {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
            .collect();
        (doc_type, compiled)
    };

    vec![
        rule(
            DocumentType::UniversalTransfer,
            &[
                r"\bупд\b",
                r"\bуниверсальн[а-яё]*\s+передаточн[а-яё]*\s+документ",
            ],
        ),
        rule(DocumentType::TaxInvoice, &[r"\bсч[её]т[\s-]+фактур"]),
        rule(
            DocumentType::Waybill,
            &[r"\bнакладн[а-яё]*\b", r"\bттн\b", r"\bторг-12\b", r"\bwaybill\b"],
        ),
        rule(
            DocumentType::Act,
            &[r"\bакт(?:а|ом|е|ы|ов)?\b", r"\bact\b"],
        ),
        rule(
            DocumentType::Invoice,
            &[r"\bсч[её]т(?:\s+на\s+оплату)?\b", r"\binvoice\b", r"\bbill\b"],
        ),
        rule(
            DocumentType::Contract,
            &[
                r"\bдоговор[а-яё]*\b",
                r"\bконтракт[а-яё]*\b",
                r"\bсоглашени[а-яё]*\b",
                r"\bcontract\b",
                r"\bagreement\b",
            ],
        ),
    ]
});

/// Classifies by keywords only. `None` when no keyword set matches.
pub fn classify_by_keywords(text: &str) -> Option<DocumentType> {
    classify_by_heading(text).or_else(|| classify_by_full_text(text))
}

fn classify_by_heading(text: &str) -> Option<DocumentType> {
    let heading: String = text.chars().take(HEADING_CHARS).collect();
    for line in heading.lines() {
        let line = line.trim_start();
        if line.is_empty() {
            continue;
        }
        for (doc_type, patterns) in RULES.iter() {
            if patterns
                .iter()
                .any(|p| p.find(line).is_some_and(|m| m.start() == 0))
            {
                return Some(*doc_type);
            }
        }
    }
    None
}

fn classify_by_full_text(text: &str) -> Option<DocumentType> {
    RULES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(text)))
        .map(|(doc_type, _)| *doc_type)
}

/// Maps a completion to a label; anything unrecognized is `Other`.
pub fn parse_label_response(response: &str) -> DocumentType {
    let trimmed = response.trim();
    if let Some(doc_type) = DocumentType::parse_label(trimmed) {
        return doc_type;
    }
    trimmed
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .and_then(DocumentType::parse_label)
        .unwrap_or(DocumentType::Other)
}

fn build_prompt(text: &str) -> String {
    let labels: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
    let excerpt: String = text.chars().take(PROMPT_TEXT_CHARS).collect();
    format!(
        "Classify this business document. Answer with exactly one label from: {}.\n\
         Answer with the label only.\n\nDocument:\n{}\n",
        labels.join(", "),
        excerpt
    )
}

pub struct Classifier {
    backend: Option<Arc<dyn InferenceBackend>>,
}

impl Classifier {
    pub fn new(backend: Option<Arc<dyn InferenceBackend>>) -> Self {
        Self { backend }
    }

    pub async fn classify(&self, text: &str) -> DocumentType {
        if let Some(doc_type) = classify_by_keywords(text) {
            return doc_type;
        }

        let Some(backend) = &self.backend else {
            return DocumentType::Other;
        };

        match backend.infer(&build_prompt(text)).await {
            Ok(response) => {
                let doc_type = parse_label_response(&response);
                tracing::debug!(label = %doc_type, "Classified by inference");
                doc_type
            }
            Err(e) => {
                tracing::warn!(error = %e, "Classification inference failed");
                DocumentType::Other
            }
        }
    }
}
