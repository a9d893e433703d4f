use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::classifier::Classifier;
use crate::document_type::DocumentType;
use crate::extractor::FieldExtractor;
use crate::fields::ExtractedFields;
use crate::inference::InferenceBackend;
use crate::ledger::{LedgerStore, SaveRequest, SavedDocument};
use crate::notify::{self, messages, NotificationSink};
use crate::sanitize;
use crate::text::TextExtractor;
use crate::validator::{self, ValidationReport};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;

/// How a pipeline run ended, short of an error.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Completed {
        doc_type: DocumentType,
        fields: ExtractedFields,
        saved: SavedDocument,
        warnings: Vec<String>,
    },
    ValidationFailed {
        doc_type: DocumentType,
        fields: ExtractedFields,
        report: ValidationReport,
    },
}

/// Per-task processing: extract text, classify, extract fields, validate,
/// persist.
pub struct Pipeline {
    config: PipelineConfig,
    text_extractor: Arc<dyn TextExtractor>,
    classifier: Classifier,
    extractor: FieldExtractor,
    ledger: Arc<dyn LedgerStore>,
}

impl Pipeline {
    /// `backend` is shared by the classifier and the slow extraction path.
    /// Without one, both run on keyword and pattern matching alone.
    pub fn new(
        config: PipelineConfig,
        text_extractor: Arc<dyn TextExtractor>,
        backend: Option<Arc<dyn InferenceBackend>>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        let classifier = Classifier::new(backend.clone());
        let extractor = FieldExtractor::new(config.extraction.clone(), backend);
        Self {
            config,
            text_extractor,
            classifier,
            extractor,
            ledger,
        }
    }

    /// Runs the full pipeline for one task. A document that fails validation
    /// is an `Ok` outcome; only unreadable documents and internal failures
    /// are errors.
    pub async fn run(
        &self,
        ctx: &mut PipelineContext,
        notifier: &dyn NotificationSink,
    ) -> Result<PipelineOutcome, PipelineError> {
        let span = info_span!("pipeline",
            task_id = %ctx.task_id,
            filename = %sanitize::redact_path(std::path::Path::new(&ctx.filename)),
        );
        self.run_steps(ctx, notifier).instrument(span).await
    }

    async fn run_steps(
        &self,
        ctx: &mut PipelineContext,
        notifier: &dyn NotificationSink,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Step 1: Extract text
        self.step_extract_text(ctx)
            .instrument(info_span!("extract_text"))
            .await?;

        // Step 2: Classify
        let doc_type = self
            .step_classify(ctx)
            .instrument(info_span!("classify"))
            .await;
        notify::deliver(
            notifier,
            &ctx.submitter_id,
            &messages::type_detected(&ctx.filename, doc_type),
        )
        .await;

        // Step 3: Extract fields
        let fields = self
            .step_extract_fields(ctx, doc_type)
            .instrument(info_span!("extract_fields", doc_type = %doc_type))
            .await?;

        // Step 4: Validate
        let report = {
            let _step = info_span!("validate").entered();
            let report = validator::validate(&fields, doc_type);
            debug!(
                errors = report.errors.len(),
                warnings = report.warnings.len(),
                "Validation finished"
            );
            ctx.validation = Some(report.clone());
            report
        };
        if !report.is_valid {
            info!(errors = ?report.errors, "Document failed validation");
            return Ok(PipelineOutcome::ValidationFailed {
                doc_type,
                fields,
                report,
            });
        }

        // Step 5: Persist
        let saved = self
            .step_persist(ctx, doc_type, &fields)
            .instrument(info_span!("persist"))
            .await?;

        Ok(PipelineOutcome::Completed {
            doc_type,
            fields,
            saved,
            warnings: report.warnings,
        })
    }

    async fn step_extract_text(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let text = self.text_extractor.extract_text(&ctx.source_path).await;
        if text.trim().is_empty() {
            return Err(PipelineError::NoText);
        }
        debug!(chars = text.chars().count(), "Text extracted");
        ctx.text = Some(text);
        Ok(())
    }

    async fn step_classify(&self, ctx: &mut PipelineContext) -> DocumentType {
        let text = ctx.text.as_deref().unwrap_or_default();
        let doc_type = self.classifier.classify(text).await;
        info!(doc_type = %doc_type, "Document classified");
        ctx.doc_type = Some(doc_type);
        doc_type
    }

    async fn step_extract_fields(
        &self,
        ctx: &mut PipelineContext,
        doc_type: DocumentType,
    ) -> Result<ExtractedFields, PipelineError> {
        let text = ctx.text.as_deref().unwrap_or_default();

        // Examples only matter to the slow path.
        let reference = if self.extractor.fast(text, Some(doc_type)).is_conclusive() {
            Vec::new()
        } else {
            self.reference_context(doc_type).await
        };

        let fields = self.extractor.extract(text, &reference, Some(doc_type)).await?;
        ctx.fields = Some(fields.clone());
        Ok(fields)
    }

    async fn reference_context(&self, doc_type: DocumentType) -> Vec<String> {
        if self.config.reference_examples == 0 {
            return Vec::new();
        }
        let ledger = Arc::clone(&self.ledger);
        let limit = self.config.reference_examples;
        match tokio::task::spawn_blocking(move || ledger.reference_context(doc_type, limit)).await {
            Ok(Ok(snippets)) => snippets,
            Ok(Err(e)) => {
                warn!(error = %e, "Could not load reference documents");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Reference lookup task failed");
                Vec::new()
            }
        }
    }

    async fn step_persist(
        &self,
        ctx: &PipelineContext,
        doc_type: DocumentType,
        fields: &ExtractedFields,
    ) -> Result<SavedDocument, PipelineError> {
        let request = SaveRequest {
            file_path: ctx.source_path.clone(),
            original_filename: ctx.filename.clone(),
            doc_type,
            fields: fields.clone(),
            submitter_id: ctx.submitter_id.clone(),
        };
        let ledger = Arc::clone(&self.ledger);

        let saved = tokio::task::spawn_blocking(move || ledger.save_document(&request))
            .await
            .map_err(|e| PipelineError::Internal(format!("ledger task failed: {}", e)))??;

        info!(document_id = saved.document_id, chain = ?saved.chain, "Document persisted");
        Ok(saved)
    }
}
