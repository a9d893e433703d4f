//! Inference backend seam.
//!
//! The pipeline only needs "prompt in, free-form text out". Locating the JSON
//! object inside a completion is the caller's job and a missing or malformed
//! object is a soft failure (`None`), never an error.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub mod ollama;

pub use ollama::OllamaClient;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Cannot connect to inference backend at {0}")]
    Connection(String),

    #[error("Inference request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Inference backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Failed to parse inference response: {0}")]
    ResponseParsing(String),
}

/// Text completion backend.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn infer(&self, prompt: &str) -> Result<String, InferenceError>;
}

/// Finds the JSON object in a free-form completion: the text between the
/// first `{` and the last `}`. Returns `None` when there is no such span or
/// it does not parse as an object.
pub fn extract_json_object(response: &str) -> Option<Value> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&response[start..=end]) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}
