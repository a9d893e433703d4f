use thiserror::Error;

use crate::error::ExtractionError;
use crate::ledger::LedgerError;
use crate::notify::messages::FailureReason;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No text could be extracted from the document")]
    NoText,

    #[error("Field extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] LedgerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// What the submitter is told. Only unreadable documents get details.
    pub fn failure_reason(&self) -> FailureReason<'static> {
        match self {
            PipelineError::NoText => FailureReason::Unreadable("no text could be extracted"),
            PipelineError::Extraction(ExtractionError::NoFields) => {
                FailureReason::Unreadable("no key fields were found")
            }
            PipelineError::Persistence(_) | PipelineError::Internal(_) => FailureReason::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;

    #[test]
    fn test_failure_reasons() {
        assert!(matches!(
            PipelineError::NoText.failure_reason(),
            FailureReason::Unreadable(_)
        ));
        assert!(matches!(
            PipelineError::Extraction(ExtractionError::NoFields).failure_reason(),
            FailureReason::Unreadable(_)
        ));
        assert_eq!(
            PipelineError::Persistence(LedgerError::Database(DatabaseError::LockPoisoned))
                .failure_reason(),
            FailureReason::Internal
        );
        assert_eq!(
            PipelineError::Internal("boom".to_string()).failure_reason(),
            FailureReason::Internal
        );
    }
}
