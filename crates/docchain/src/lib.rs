pub mod classifier;
pub mod config;
pub mod db;
pub mod document_type;
pub mod error;
pub mod extractor;
pub mod fields;
pub mod inference;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod sanitize;
pub mod telemetry;
pub mod text;
pub mod validator;
pub mod worker;

pub use classifier::Classifier;
pub use config::{load_config, Config, LogFormat};
pub use db::Database;
pub use document_type::{DocumentType, LinkType};
pub use error::{ConfigError, DocchainError, ExtractionError, Result, StorageError, WorkerError};
pub use extractor::FieldExtractor;
pub use fields::{ExtractedFields, FieldName};
pub use inference::{InferenceBackend, OllamaClient};
pub use ledger::{ChainOutcome, LedgerReports, LedgerStore, SaveRequest, SavedDocument, SqliteLedger};
pub use notify::{ChannelSink, LogSink, NotificationSink};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineError, PipelineOutcome};
pub use text::{FileTextExtractor, TextExtractor};
pub use validator::ValidationReport;
pub use worker::{PoolConfig, PoolStats, ProcessingTask, TaskStatus, WorkerPool};
