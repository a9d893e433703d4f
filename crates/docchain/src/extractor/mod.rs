//! Field extraction: a deterministic fast path, escalating to windowed
//! inference when the fast path is inconclusive.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::config::ExtractionConfig;
use crate::document_type::DocumentType;
use crate::error::ExtractionError;
use crate::fields::{ExtractedFields, FieldName};
use crate::inference::InferenceBackend;
use crate::validator::required_fields;

pub mod amount;
pub mod dates;
pub mod patterns;
pub mod slow;
pub mod window;

pub use patterns::FastExtraction;

/// Fields worth asking the backend for. Besides the required set, documents
/// that attach to a chain need their contract number.
pub fn wanted_fields(doc_type: Option<DocumentType>) -> Vec<FieldName> {
    let Some(doc_type) = doc_type else {
        return FieldName::ALL.to_vec();
    };
    let mut fields = required_fields(doc_type).to_vec();
    let links_to_chain = doc_type == DocumentType::Invoice || doc_type.is_closing();
    if links_to_chain && !fields.contains(&FieldName::ContractNumber) {
        fields.push(FieldName::ContractNumber);
    }
    fields
}

pub struct FieldExtractor {
    config: ExtractionConfig,
    backend: Option<Arc<dyn InferenceBackend>>,
}

impl FieldExtractor {
    pub fn new(config: ExtractionConfig, backend: Option<Arc<dyn InferenceBackend>>) -> Self {
        Self { config, backend }
    }

    pub fn fast(&self, text: &str, doc_type: Option<DocumentType>) -> FastExtraction {
        patterns::fast_extract(text, doc_type, self.config.min_plausible_amount, today())
    }

    /// Extracts fields from `text`.
    ///
    /// `reference_context` holds snippets of previously stored documents that
    /// are shown to the backend. Fails with `ExtractionError::NoFields` only
    /// when neither path found anything usable.
    pub async fn extract(
        &self,
        text: &str,
        reference_context: &[String],
        doc_type: Option<DocumentType>,
    ) -> Result<ExtractedFields, ExtractionError> {
        let fast = self.fast(text, doc_type);
        if fast.is_conclusive() {
            tracing::debug!(found = fast.found(), "Fast path conclusive");
            return Ok(fast.fields);
        }

        tracing::debug!(
            found = fast.found(),
            suspicious = ?fast.suspicious,
            "Fast path inconclusive"
        );

        let trusted = fast.trusted_fields();
        let inferred = match &self.backend {
            Some(backend) => {
                self.slow(backend.as_ref(), text, reference_context, doc_type, &trusted)
                    .await
            }
            None => ExtractedFields::default(),
        };

        let mut fields = inferred.merged(&trusted);
        if doc_type == Some(DocumentType::Contract) && !fields.is_set(FieldName::ContractNumber) {
            if let Some(number) = fields.document_number.clone() {
                fields.set(FieldName::ContractNumber, &number);
            }
        }

        if fields.is_empty() {
            return Err(ExtractionError::NoFields);
        }
        Ok(fields)
    }

    /// Walks the windows until every wanted field is known, the window
    /// budget is spent, or the backend fails.
    async fn slow(
        &self,
        backend: &dyn InferenceBackend,
        text: &str,
        reference_context: &[String],
        doc_type: Option<DocumentType>,
        known: &ExtractedFields,
    ) -> ExtractedFields {
        let wanted = wanted_fields(doc_type);
        let mut inferred = ExtractedFields::default();

        let cleaned = window::clean_text(text);
        let windows = window::windows(
            &cleaned,
            self.config.window_size,
            self.config.window_overlap,
            self.config.max_windows,
        );

        for (index, chunk) in windows.iter().enumerate() {
            let missing = inferred.clone().merged(known).missing(&wanted);
            if missing.is_empty() {
                tracing::debug!(windows_used = index, "All wanted fields found");
                break;
            }

            let prompt = slow::build_prompt(chunk, &missing, doc_type, reference_context);
            let response = match backend.infer(&prompt).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(window = index, error = %e, "Inference failed, keeping fast-path fields");
                    break;
                }
            };

            match slow::parse_response(&response, &missing) {
                Some(window_fields) => inferred.merge(&window_fields),
                None => tracing::debug!(window = index, "No JSON object in inference response"),
            }
        }

        for field in patterns::suspicious_fields(&inferred, self.config.min_plausible_amount, today()) {
            inferred.clear(field);
        }
        inferred
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::inference::InferenceError;

    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<String, InferenceError>>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String, InferenceError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn infer(&self, prompt: &str) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("{}".to_string()))
        }
    }

    fn small_windows() -> ExtractionConfig {
        ExtractionConfig {
            window_size: 40,
            window_overlap: 10,
            max_windows: 5,
            min_plausible_amount: 100.0,
        }
    }

    #[tokio::test]
    async fn test_conclusive_fast_path_skips_backend() {
        let backend = ScriptedBackend::new(vec![]);
        let extractor = FieldExtractor::new(ExtractionConfig::default(), Some(backend.clone()));
        let fields = extractor
            .extract(
                "ДОГОВОР №Д-2024-001 от 15.01.2024 ООО Поставщик ИНН 1234567890 Сумма 1000000",
                &[],
                Some(DocumentType::Contract),
            )
            .await
            .unwrap();
        assert_eq!(fields.contract_number.as_deref(), Some("Д-2024-001"));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_slow_path_fills_gaps_and_stops_early() {
        let backend = ScriptedBackend::new(vec![
            Ok(r#"{"counterparty": "ООО Бета", "date": null}"#.to_string()),
            Ok(r#"{"counterparty": "ООО Другое", "date": "01.02.2024", "amount": "15000"}"#.to_string()),
        ]);
        let extractor = FieldExtractor::new(small_windows(), Some(backend.clone()));
        let text = "Счет №77 поставщик бета. ".repeat(10);

        let fields = extractor
            .extract(&text, &[], Some(DocumentType::Invoice))
            .await
            .unwrap();

        assert_eq!(fields.counterparty.as_deref(), Some("ООО Бета"));
        assert_eq!(fields.date.as_deref(), Some("01.02.2024"));
        assert_eq!(fields.amount.as_deref(), Some("15000"));
        assert_eq!(fields.document_number.as_deref(), Some("77"));
        assert!(backend.calls() >= 2);
        let prompts = backend.prompts.lock().unwrap();
        assert!(!prompts[0].contains("- document_number:"));
        assert!(!prompts[1].contains("- counterparty:"));
    }

    #[tokio::test]
    async fn test_early_stop_when_everything_is_known() {
        let backend = ScriptedBackend::new(vec![Ok(
            r#"{"counterparty": "ООО Бета", "date": "01.02.2024", "amount": "15000", "document_number": "77"}"#
                .to_string(),
        )]);
        let extractor = FieldExtractor::new(small_windows(), Some(backend.clone()));
        let text = "неразборчивый скан ".repeat(20);

        let fields = extractor
            .extract(&text, &[], Some(DocumentType::Contract))
            .await
            .unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(fields.contract_number.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_fast_path() {
        let backend = ScriptedBackend::new(vec![Err(InferenceError::Timeout(120))]);
        let extractor = FieldExtractor::new(ExtractionConfig::default(), Some(backend.clone()));
        let fields = extractor
            .extract("Акт №А-1 ООО Альфа", &[], Some(DocumentType::Act))
            .await
            .unwrap();
        assert_eq!(fields.document_number.as_deref(), Some("А-1"));
        assert_eq!(fields.counterparty.as_deref(), Some("ООО Альфа"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_suspicious_values_are_dropped() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{"amount": "3"}"#.to_string())]);
        let extractor = FieldExtractor::new(ExtractionConfig::default(), Some(backend));
        let fields = extractor
            .extract("Счет №12 ООО Альфа Итого 50", &[], Some(DocumentType::Invoice))
            .await
            .unwrap();
        assert!(fields.amount.is_none());
        assert_eq!(fields.document_number.as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn test_nothing_found_is_an_error() {
        let extractor = FieldExtractor::new(ExtractionConfig::default(), None);
        let result = extractor.extract("просто текст", &[], None).await;
        assert!(matches!(result, Err(ExtractionError::NoFields)));
    }

    #[test]
    fn test_wanted_fields_add_contract_number_for_linked_types() {
        assert!(wanted_fields(Some(DocumentType::Act)).contains(&FieldName::ContractNumber));
        assert!(wanted_fields(Some(DocumentType::Invoice)).contains(&FieldName::ContractNumber));
        assert!(!wanted_fields(Some(DocumentType::Contract)).contains(&FieldName::ContractNumber));
        assert_eq!(wanted_fields(None).len(), 7);
    }
}
