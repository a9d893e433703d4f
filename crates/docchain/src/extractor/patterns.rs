//! Deterministic field search used by the fast path.
//!
//! Every field is searched independently. Where several candidates exist
//! they are scored by what surrounds them and the best one wins; ties go to
//! the earliest candidate unless noted otherwise.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::amount::parse_amount;
use super::dates::{is_plausible, parse_date};
use crate::document_type::DocumentType;
use crate::fields::{ExtractedFields, FieldName};
use crate::validator::tax_id;

/// Fields the fast path looks for. Subject is left to the slow path.
pub const FAST_FIELDS: [FieldName; 6] = [
    FieldName::TaxId,
    FieldName::Counterparty,
    FieldName::DocumentNumber,
    FieldName::Date,
    FieldName::Amount,
    FieldName::ContractNumber,
];

static LABELED_TAX_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ИНН(?:\s*/\s*КПП)?[\s:№]*(\d+)").unwrap());

static STANDALONE_TAX_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{12}|\d{10})\b").unwrap());

static COUNTERPARTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\b(?:ПАО|ОАО|ЗАО|ООО|АО|ИП)\s+(?:«[^»\n]{1,80}»|"[^"\n]{1,80}"|[А-ЯЁA-Z][^\s,;]*(?:\s+[А-ЯЁ][а-яё]+){0,2})"#,
    )
    .unwrap()
});

static TYPED_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(договор[а-яё]*|контракт[а-яё]*|соглашени[а-яё]*|счет-фактур[а-яё]*|счёт-фактур[а-яё]*|сч[её]т[а-яё]*|акт[а-яё]*|накладн[а-яё]*|упд|ттн)(?:\s+на\s+оплату)?\s*№\s*([^\s,;]+)",
    )
    .unwrap()
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"№\s*([^\s,;]+)").unwrap());

static CONTRACT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:договор[а-яё]*|контракт[а-яё]*)(?:\s+(?:поставки|подряда|оказания\s+услуг|купли-продажи))?\s*№\s*([^\s,;]+)",
    )
    .unwrap()
});

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\d{1,2}[./-]\d{1,2}[./-]\d{4}|\d{4}-\d{2}-\d{2}|«?\d{1,2}»?\s+[а-яёА-ЯЁ]+\s+\d{4})",
    )
    .unwrap()
});

static AMOUNT_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)итого|всего|сумма|к\s+оплате|стоимость|total|amount\s+due").unwrap()
});

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{1,3}(?:[ \u{00a0}]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?").unwrap()
});

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d{1,3}(?:[ \u{00a0}]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?)\s*(?:руб|₽|rub)",
    )
    .unwrap()
});

/// Characters after an amount anchor searched for the amount itself.
const ANCHOR_WINDOW_CHARS: usize = 60;

static QUANTITY_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)шт|кол-во|количеств|qty").unwrap());

static DATE_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:\bот|дата)[\s:]*$").unwrap());

/// Outcome of the fast path.
#[derive(Debug, Clone, Default)]
pub struct FastExtraction {
    pub fields: ExtractedFields,
    /// Found fields whose values look wrong.
    pub suspicious: Vec<FieldName>,
}

impl FastExtraction {
    pub fn found(&self) -> usize {
        self.fields.count_set(&FAST_FIELDS)
    }

    /// At least three fields found and none of them suspicious.
    pub fn is_conclusive(&self) -> bool {
        self.found() >= 3 && self.suspicious.is_empty()
    }

    /// Found fields minus the suspicious ones.
    pub fn trusted_fields(&self) -> ExtractedFields {
        let mut fields = self.fields.clone();
        for field in &self.suspicious {
            fields.clear(*field);
        }
        fields
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    value: String,
    score: i32,
    start: usize,
}

/// Runs the pattern search over `text`.
pub fn fast_extract(
    text: &str,
    doc_type: Option<DocumentType>,
    min_plausible_amount: f64,
    today: NaiveDate,
) -> FastExtraction {
    let mut fields = ExtractedFields::default();

    if let Some(value) = find_tax_id(text) {
        fields.set(FieldName::TaxId, &value);
    }
    if let Some(value) = find_counterparty(text) {
        fields.set(FieldName::Counterparty, &value);
    }
    if let Some(value) = find_document_number(text, doc_type) {
        fields.set(FieldName::DocumentNumber, &value);
    }
    if let Some(value) = find_date(text) {
        fields.set(FieldName::Date, &value);
    }
    if let Some(value) = find_amount(text, min_plausible_amount) {
        fields.set(FieldName::Amount, &value);
    }
    if let Some(value) = find_contract_number(text) {
        fields.set(FieldName::ContractNumber, &value);
    }
    if doc_type == Some(DocumentType::Contract) && !fields.is_set(FieldName::ContractNumber) {
        if let Some(number) = fields.document_number.clone() {
            fields.set(FieldName::ContractNumber, &number);
        }
    }

    let suspicious = suspicious_fields(&fields, min_plausible_amount, today);
    FastExtraction { fields, suspicious }
}

/// Fields whose values fail the plausibility checks.
pub fn suspicious_fields(
    fields: &ExtractedFields,
    min_plausible_amount: f64,
    today: NaiveDate,
) -> Vec<FieldName> {
    let mut suspicious = Vec::new();

    if let Some(amount) = fields.get(FieldName::Amount) {
        match parse_amount(amount) {
            Some(value) if value >= min_plausible_amount => {}
            _ => suspicious.push(FieldName::Amount),
        }
    }
    if let Some(number) = fields.get(FieldName::DocumentNumber) {
        if number.chars().count() < 2 || !number.chars().any(char::is_alphanumeric) {
            suspicious.push(FieldName::DocumentNumber);
        }
    }
    if let Some(date) = fields.get(FieldName::Date) {
        match parse_date(date) {
            Some(parsed) if is_plausible(parsed, today) => {}
            _ => suspicious.push(FieldName::Date),
        }
    }

    suspicious
}

fn find_tax_id(text: &str) -> Option<String> {
    if let Some(caps) = LABELED_TAX_ID.captures(text) {
        return Some(caps[1].to_string());
    }
    STANDALONE_TAX_ID
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|digits| tax_id::checksum_valid(digits))
}

fn find_counterparty(text: &str) -> Option<String> {
    COUNTERPARTY
        .find(text)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
}

fn find_document_number(text: &str, doc_type: Option<DocumentType>) -> Option<String> {
    let mut candidates = Vec::new();
    let mut typed_spans = Vec::new();

    for caps in TYPED_NUMBER.captures_iter(text) {
        let (Some(keyword), Some(number)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        typed_spans.push(number.start());

        let keyword = keyword.as_str().to_lowercase();
        let refers_to_contract = keyword.starts_with("договор")
            || keyword.starts_with("контракт")
            || keyword.starts_with("соглашени");
        // A contract reference inside an act or invoice is not its own number.
        let score = match doc_type {
            Some(DocumentType::Contract) | None if refers_to_contract => 2,
            _ if refers_to_contract => continue,
            _ => 2,
        };
        candidates.push(Candidate {
            value: clean_number(number.as_str()),
            score,
            start: number.start(),
        });
    }

    for caps in BARE_NUMBER.captures_iter(text) {
        let Some(number) = caps.get(1) else {
            continue;
        };
        if typed_spans.contains(&number.start()) {
            continue;
        }
        candidates.push(Candidate {
            value: clean_number(number.as_str()),
            score: 1,
            start: number.start(),
        });
    }

    best_earliest(candidates)
}

fn find_contract_number(text: &str) -> Option<String> {
    CONTRACT_NUMBER
        .captures(text)
        .map(|caps| clean_number(&caps[1]))
        .filter(|n| !n.is_empty())
}

fn find_date(text: &str) -> Option<String> {
    let candidates = DATE
        .captures_iter(text)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            parse_date(m.as_str())?;
            let before = context_before(text, m.start(), 12);
            let score = if DATE_ANCHOR.is_match(&before) { 2 } else { 1 };
            Some(Candidate {
                value: m.as_str().to_string(),
                score,
                start: m.start(),
            })
        })
        .collect();
    best_earliest(candidates)
}

fn find_amount(text: &str, min_plausible_amount: f64) -> Option<String> {
    let mut candidates: Vec<(Candidate, f64)> = Vec::new();

    for anchor in AMOUNT_ANCHOR.find_iter(text) {
        let window_end = byte_offset_after(text, anchor.end(), ANCHOR_WINDOW_CHARS);
        let window = &text[anchor.end()..window_end];
        let first = NUMBER
            .find_iter(window)
            .map(|m| (anchor.end() + m.start(), anchor.end() + m.end()))
            .find(|(start, end)| is_standalone_number(text, *start, *end));
        if let Some((start, end)) = first {
            candidates.extend(amount_candidate(text, start, end, 3));
        }
    }
    for caps in CURRENCY_AMOUNT.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            if is_standalone_number(text, m.start(), m.end()) {
                candidates.extend(amount_candidate(text, m.start(), m.end(), 2));
            }
        }
    }

    // Plausible amounts first; an implausible one is still returned so the
    // caller can flag it.
    let plausible: Vec<_> = candidates
        .iter()
        .filter(|(_, v)| *v >= min_plausible_amount)
        .cloned()
        .collect();
    let pool = if plausible.is_empty() {
        candidates
    } else {
        plausible
    };

    // Equal scores go to the larger amount: totals outgrow their line items.
    pool.into_iter()
        .max_by(|(a, av), (b, bv)| {
            a.score
                .cmp(&b.score)
                .then(av.partial_cmp(bv).unwrap_or(std::cmp::Ordering::Equal))
                .then(b.start.cmp(&a.start))
        })
        .map(|(c, _)| c.value)
}

fn amount_candidate(text: &str, start: usize, end: usize, base: i32) -> Option<(Candidate, f64)> {
    let raw = text[start..end].trim();
    let value = parse_amount(raw)?;
    let around = format!(
        "{}{}",
        context_before(text, start, 15),
        context_after(text, end, 15)
    );
    let penalty = if QUANTITY_CONTEXT.is_match(&around) { 2 } else { 0 };
    Some((
        Candidate {
            value: raw.to_string(),
            score: base - penalty,
            start,
        },
        value,
    ))
}

fn best_earliest(candidates: Vec<Candidate>) -> Option<String> {
    candidates
        .into_iter()
        .filter(|c| !c.value.is_empty())
        .max_by(|a, b| a.score.cmp(&b.score).then(b.start.cmp(&a.start)))
        .map(|c| c.value)
}

/// Strips punctuation that trails a number in running text.
fn clean_number(raw: &str) -> String {
    raw.trim_end_matches(['.', ',', ';', ':', ')', '»', '"'])
        .trim_start_matches(['«', '"', '('])
        .to_string()
}

/// A number glued to letters, hyphens or slashes is part of an identifier
/// or date, not an amount.
fn is_standalone_number(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let mut after = text[end..].chars();
    let next = after.next();
    let next_next = after.next();

    let glued_before =
        before.is_some_and(|c| c.is_alphanumeric() || matches!(c, '-' | '/' | '.' | ','));
    let glued_after = match next {
        Some(c) if c.is_alphanumeric() && !c.is_ascii_digit() => {
            !matches!(c, 'р' | 'Р' | 'r' | 'R')
        }
        Some('-' | '/' | '.') => next_next.is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };
    !glued_before && !glued_after
}

fn context_before(text: &str, index: usize, chars: usize) -> String {
    let mut collected: Vec<char> = text[..index].chars().rev().take(chars).collect();
    collected.reverse();
    collected.into_iter().collect()
}

fn context_after(text: &str, index: usize, chars: usize) -> String {
    text[index..].chars().take(chars).collect()
}

/// Byte index `chars` characters after `index`, clamped to the text end.
fn byte_offset_after(text: &str, index: usize, chars: usize) -> usize {
    text[index..]
        .char_indices()
        .nth(chars)
        .map(|(offset, _)| index + offset)
        .unwrap_or(text.len())
}
