use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document_type::DocumentType;
use crate::fields::ExtractedFields;
use crate::ledger::ChainOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    ValidationFailed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::ValidationFailed
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::ValidationFailed => "VALIDATION_FAILED",
        };
        f.pad(s)
    }
}

/// Result payload of a task that got as far as field extraction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub doc_type: DocumentType,
    pub fields: ExtractedFields,
    pub document_id: Option<i64>,
    pub chain: Option<ChainOutcome>,
    pub processing_secs: f64,
}

/// One submitted document and everything known about its processing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingTask {
    pub id: String,
    pub submitter_id: String,
    pub filename: String,
    pub source_path: PathBuf,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    pub validation_errors: Vec<String>,
    pub validation_warnings: Vec<String>,
}

impl ProcessingTask {
    pub fn new(
        submitter_id: impl Into<String>,
        filename: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submitter_id: submitter_id.into(),
            filename: filename.into(),
            source_path: source_path.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            validation_errors: Vec::new(),
            validation_warnings: Vec::new(),
        }
    }

    pub(crate) fn mark_processing(&mut self) {
        self.status = TaskStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_completed(&mut self, result: TaskResult, warnings: Vec<String>) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        self.validation_warnings = warnings;
    }

    pub(crate) fn mark_validation_failed(
        &mut self,
        result: TaskResult,
        errors: Vec<String>,
        warnings: Vec<String>,
    ) {
        self.status = TaskStatus::ValidationFailed;
        self.completed_at = Some(Utc::now());
        self.error = Some(format!("validation errors: {}", errors.join(", ")));
        self.result = Some(result);
        self.validation_errors = errors;
        self.validation_warnings = warnings;
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}
