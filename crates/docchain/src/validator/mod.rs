//! Field validation against per-type required fields and domain rules.
//!
//! Errors block persistence, warnings are informational. Field checks run
//! only for fields in the document type's required set.

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::document_type::DocumentType;
use crate::extractor::amount::parse_amount;
use crate::extractor::dates::parse_date;
use crate::fields::{ExtractedFields, FieldName};

pub mod tax_id;

const LEGAL_FORMS: &[&str] = &["ООО", "ОАО", "ЗАО", "ИП", "АО", "ПАО", "НКО", "ГУП", "МУП"];
const CONTRACT_KEYWORDS: &[&str] = &["договор", "контракт", "соглашение", "№", "n", "number"];

const CONTRACT_FIELDS: &[FieldName] = &[
    FieldName::Counterparty,
    FieldName::Date,
    FieldName::DocumentNumber,
];
const PRIMARY_FIELDS: &[FieldName] = &[
    FieldName::Counterparty,
    FieldName::Date,
    FieldName::DocumentNumber,
    FieldName::Amount,
];
const TRANSFER_FIELDS: &[FieldName] = &[
    FieldName::Counterparty,
    FieldName::Date,
    FieldName::DocumentNumber,
    FieldName::Amount,
    FieldName::TaxId,
];

/// Fields that must be present for a document of this type.
pub fn required_fields(doc_type: DocumentType) -> &'static [FieldName] {
    match doc_type {
        DocumentType::Contract => CONTRACT_FIELDS,
        DocumentType::Invoice | DocumentType::Act | DocumentType::Waybill => PRIMARY_FIELDS,
        DocumentType::UniversalTransfer | DocumentType::TaxInvoice => TRANSFER_FIELDS,
        DocumentType::Other => &FieldName::ALL,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validates with the local calendar date as "today".
pub fn validate(fields: &ExtractedFields, doc_type: DocumentType) -> ValidationReport {
    validate_as_of(fields, doc_type, Local::now().date_naive())
}

/// Validates as if the current date were `today`. Deterministic for a fixed
/// input.
pub fn validate_as_of(
    fields: &ExtractedFields,
    doc_type: DocumentType,
    today: NaiveDate,
) -> ValidationReport {
    let required = required_fields(doc_type);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for field in fields.missing(required) {
        errors.push(format!("missing required field: {}", field));
    }

    for field in required {
        let Some(value) = fields.get(*field) else {
            continue;
        };
        match field {
            FieldName::TaxId => check_tax_id(value, &mut errors, &mut warnings),
            FieldName::Counterparty => check_counterparty(value, &mut errors, &mut warnings),
            FieldName::Amount => check_amount(value, &mut errors),
            FieldName::Date => check_date(value, today, &mut errors, &mut warnings),
            FieldName::DocumentNumber => check_document_number(value, &mut errors),
            FieldName::ContractNumber => check_contract_number(value, &mut warnings),
            FieldName::Subject => {}
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_tax_id(value: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    let digits = tax_id::normalize(value);
    if digits.len() != 10 && digits.len() != 12 {
        errors.push(format!(
            "invalid tax id length: {} has {} digits (expected 10 or 12 digits)",
            value,
            digits.len()
        ));
        return;
    }
    if !tax_id::checksum_valid(&digits) {
        warnings.push(format!("tax id checksum mismatch: {}", value));
    }
}

fn check_counterparty(value: &str, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
    if value.trim().chars().count() < 3 {
        errors.push(format!("counterparty name too short: {}", value));
    }
    let upper = value.to_uppercase();
    if !LEGAL_FORMS.iter().any(|form| upper.contains(form)) {
        warnings.push(format!("counterparty has no legal form marker: {}", value));
    }
}

fn check_amount(value: &str, errors: &mut Vec<String>) {
    match parse_amount(value) {
        Some(amount) if amount > 0.0 => {}
        Some(_) => errors.push(format!("amount must be positive: {}", value)),
        None => errors.push(format!("invalid amount format: {}", value)),
    }
}

fn check_date(
    value: &str,
    today: NaiveDate,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    match parse_date(value) {
        Some(date) if date > today => warnings.push(format!("date is in the future: {}", value)),
        Some(_) => {}
        None => errors.push(format!("unrecognized date: {}", value)),
    }
}

fn check_document_number(value: &str, errors: &mut Vec<String>) {
    if value.trim().chars().count() < 2 {
        errors.push(format!("document number too short: {}", value));
    }
}

fn check_contract_number(value: &str, warnings: &mut Vec<String>) {
    if value.trim().chars().count() < 2 {
        warnings.push(format!("contract number too short: {}", value));
    }
    let lowered = value.to_lowercase();
    if !CONTRACT_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        warnings.push(format!("contract number may be malformed: {}", value));
    }
}
