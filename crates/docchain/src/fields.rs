//! Fixed-shape field set produced by extraction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the seven extractable fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    TaxId,
    Counterparty,
    DocumentNumber,
    Date,
    Amount,
    Subject,
    ContractNumber,
}

impl FieldName {
    pub const ALL: [FieldName; 7] = [
        FieldName::TaxId,
        FieldName::Counterparty,
        FieldName::DocumentNumber,
        FieldName::Date,
        FieldName::Amount,
        FieldName::Subject,
        FieldName::ContractNumber,
    ];

    /// Key used in inference prompts and JSON payloads.
    pub fn key(&self) -> &'static str {
        match self {
            FieldName::TaxId => "tax_id",
            FieldName::Counterparty => "counterparty",
            FieldName::DocumentNumber => "document_number",
            FieldName::Date => "date",
            FieldName::Amount => "amount",
            FieldName::Subject => "subject",
            FieldName::ContractNumber => "contract_number",
        }
    }

    /// Short human description, used when asking the inference backend.
    pub fn description(&self) -> &'static str {
        match self {
            FieldName::TaxId => "taxpayer id (INN) of the counterparty, 10 or 12 digits",
            FieldName::Counterparty => "counterparty organisation name with its legal form",
            FieldName::DocumentNumber => "number of this document",
            FieldName::Date => "issue date of this document",
            FieldName::Amount => "total amount in roubles",
            FieldName::Subject => "subject of the deal in a few words",
            FieldName::ContractNumber => "number of the contract this document belongs to",
        }
    }

    /// Alternative keys seen in model output.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            FieldName::TaxId => &["tax_id", "taxId", "inn", "INN"],
            FieldName::Counterparty => &["counterparty", "company", "counterparty_name"],
            FieldName::DocumentNumber => &["document_number", "documentNumber", "doc_number", "number"],
            FieldName::Date => &["date", "document_date"],
            FieldName::Amount => &["amount", "total", "sum"],
            FieldName::Subject => &["subject"],
            FieldName::ContractNumber => &["contract_number", "contractNumber"],
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Values that mean "nothing found" when they come back from OCR or a model.
const PLACEHOLDERS: &[&str] = &[
    "-",
    "—",
    "null",
    "none",
    "n/a",
    "unknown",
    "не указано",
    "не указан",
    "неизвестно",
];

/// Extracted fields. `None` marks a field that has not been found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub tax_id: Option<String>,
    pub counterparty: Option<String>,
    pub document_number: Option<String>,
    pub date: Option<String>,
    pub amount: Option<String>,
    pub subject: Option<String>,
    pub contract_number: Option<String>,
}

impl ExtractedFields {
    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn is_set(&self, field: FieldName) -> bool {
        self.slot(field).is_some()
    }

    /// Stores a value after trimming; blanks and placeholders leave the field unset.
    pub fn set(&mut self, field: FieldName, value: &str) {
        *self.slot_mut(field) = normalize_value(value);
    }

    pub fn clear(&mut self, field: FieldName) {
        *self.slot_mut(field) = None;
    }

    /// Fills every unset field from `other`. Fields that already hold a value
    /// are never overwritten.
    pub fn merge(&mut self, other: &ExtractedFields) {
        for field in FieldName::ALL {
            if self.slot(field).is_none() {
                if let Some(value) = other.slot(field) {
                    *self.slot_mut(field) = Some(value.clone());
                }
            }
        }
    }

    pub fn merged(mut self, other: &ExtractedFields) -> Self {
        self.merge(other);
        self
    }

    pub fn count_set(&self, fields: &[FieldName]) -> usize {
        fields.iter().filter(|f| self.is_set(**f)).count()
    }

    pub fn is_empty(&self) -> bool {
        FieldName::ALL.iter().all(|f| !self.is_set(*f))
    }

    pub fn missing(&self, required: &[FieldName]) -> Vec<FieldName> {
        required
            .iter()
            .copied()
            .filter(|f| !self.is_set(*f))
            .collect()
    }

    /// Reads a loosely-shaped JSON object. Unknown keys are ignored, numbers
    /// are accepted as strings, and blank or placeholder values stay unset.
    pub fn from_json(value: &Value) -> Self {
        let mut fields = Self::default();
        let Some(map) = value.as_object() else {
            return fields;
        };

        for field in FieldName::ALL {
            let found = field.aliases().iter().find_map(|key| map.get(*key));
            let text = match found {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            if let Some(text) = text {
                fields.set(field, &text);
            }
        }

        fields
    }

    fn slot(&self, field: FieldName) -> &Option<String> {
        match field {
            FieldName::TaxId => &self.tax_id,
            FieldName::Counterparty => &self.counterparty,
            FieldName::DocumentNumber => &self.document_number,
            FieldName::Date => &self.date,
            FieldName::Amount => &self.amount,
            FieldName::Subject => &self.subject,
            FieldName::ContractNumber => &self.contract_number,
        }
    }

    fn slot_mut(&mut self, field: FieldName) -> &mut Option<String> {
        match field {
            FieldName::TaxId => &mut self.tax_id,
            FieldName::Counterparty => &mut self.counterparty,
            FieldName::DocumentNumber => &mut self.document_number,
            FieldName::Date => &mut self.date,
            FieldName::Amount => &mut self.amount,
            FieldName::Subject => &mut self.subject,
            FieldName::ContractNumber => &mut self.contract_number,
        }
    }
}

fn normalize_value(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if PLACEHOLDERS.contains(&lowered.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ExtractedFields {
        ExtractedFields {
            tax_id: Some("7707083893".to_string()),
            counterparty: Some("ООО Ромашка".to_string()),
            document_number: None,
            date: Some("01.02.2024".to_string()),
            amount: Some("1500".to_string()),
            subject: None,
            contract_number: None,
        }
    }

    #[test]
    fn test_merge_with_unset_is_noop() {
        let original = sample();
        let merged = original.clone().merged(&ExtractedFields::default());
        assert_eq!(merged, original);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let original = sample();
        let merged = original.clone().merged(&original);
        assert_eq!(merged, original);
    }

    #[test]
    fn test_merge_never_overwrites_existing_value() {
        let mut first = sample();
        let second = ExtractedFields {
            amount: Some("999".to_string()),
            document_number: Some("42".to_string()),
            ..Default::default()
        };
        first.merge(&second);
        assert_eq!(first.amount.as_deref(), Some("1500"));
        assert_eq!(first.document_number.as_deref(), Some("42"));
    }

    #[test]
    fn test_set_ignores_placeholders() {
        let mut fields = ExtractedFields::default();
        fields.set(FieldName::Subject, "  ");
        fields.set(FieldName::Date, "Не указано");
        fields.set(FieldName::Amount, "-");
        assert!(fields.is_empty());

        fields.set(FieldName::Amount, " 100 ");
        assert_eq!(fields.get(FieldName::Amount), Some("100"));
    }

    #[test]
    fn test_from_json_accepts_aliases_and_numbers() {
        let value = json!({
            "inn": "7707083893",
            "company": "ООО Ромашка",
            "number": 17,
            "amount": 2500.5,
            "subject": "",
            "unexpected": "ignored"
        });
        let fields = ExtractedFields::from_json(&value);
        assert_eq!(fields.tax_id.as_deref(), Some("7707083893"));
        assert_eq!(fields.counterparty.as_deref(), Some("ООО Ромашка"));
        assert_eq!(fields.document_number.as_deref(), Some("17"));
        assert_eq!(fields.amount.as_deref(), Some("2500.5"));
        assert!(fields.subject.is_none());
    }

    #[test]
    fn test_from_json_non_object_is_empty() {
        assert!(ExtractedFields::from_json(&json!(["a", "b"])).is_empty());
    }

    #[test]
    fn test_missing_lists_unset_required_fields() {
        let fields = sample();
        let missing = fields.missing(&[
            FieldName::Counterparty,
            FieldName::DocumentNumber,
            FieldName::Subject,
        ]);
        assert_eq!(missing, vec![FieldName::DocumentNumber, FieldName::Subject]);
        assert_eq!(fields.count_set(&FieldName::ALL), 4);
    }
}
