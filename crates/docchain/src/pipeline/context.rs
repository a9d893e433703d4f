use std::path::PathBuf;

use crate::document_type::DocumentType;
use crate::fields::ExtractedFields;
use crate::validator::ValidationReport;

pub struct PipelineContext {
    // Input
    pub task_id: String,
    pub submitter_id: String,
    pub filename: String,
    pub source_path: PathBuf,

    // Step 1 result
    pub text: Option<String>,

    // Step 2 result
    pub doc_type: Option<DocumentType>,

    // Step 3 result
    pub fields: Option<ExtractedFields>,

    // Step 4 result
    pub validation: Option<ValidationReport>,
}

impl PipelineContext {
    pub fn new(
        task_id: impl Into<String>,
        submitter_id: impl Into<String>,
        filename: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            submitter_id: submitter_id.into(),
            filename: filename.into(),
            source_path: source_path.into(),
            text: None,
            doc_type: None,
            fields: None,
            validation: None,
        }
    }
}
