//! Text extraction collaborator: turns a submitted file into plain text.

use std::path::Path;

use async_trait::async_trait;

pub mod file;

pub use file::FileTextExtractor;

/// Reads the text of a document. Implementations never fail: a file that
/// cannot be read yields an empty string, which the pipeline reports as an
/// unreadable document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> String;
}
