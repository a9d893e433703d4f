use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::TextExtractor;
use crate::sanitize::redact_path;

/// Pattern lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is accepted regardless of composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Below this share of alphanumeric characters the text is treated as garbled.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Text,
    Pdf,
    Image,
    Unknown,
}

/// Reads UTF-8 text files and the embedded text layer of PDFs. Images, and
/// PDFs without a usable text layer, go to the optional image reader (an
/// OCR service); without one they yield no text.
#[derive(Default)]
pub struct FileTextExtractor {
    image_reader: Option<Arc<dyn TextExtractor>>,
}

impl FileTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image_reader(image_reader: Arc<dyn TextExtractor>) -> Self {
        Self {
            image_reader: Some(image_reader),
        }
    }

    async fn read_image(&self, path: &Path) -> String {
        match &self.image_reader {
            Some(reader) => reader.extract_text(path).await,
            None => {
                tracing::warn!(file = %redact_path(path), "No image reader configured");
                String::new()
            }
        }
    }
}

#[async_trait]
impl TextExtractor for FileTextExtractor {
    async fn extract_text(&self, path: &Path) -> String {
        let owned = path.to_path_buf();
        let read = tokio::task::spawn_blocking(move || read_embedded_text(&owned)).await;

        let (format, text) = match read {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(file = %redact_path(path), error = %e, "Text extraction task failed");
                return String::new();
            }
        };

        if is_unusable(&text) && matches!(format, SourceFormat::Image | SourceFormat::Pdf) {
            return self.read_image(path).await;
        }
        if is_unusable(&text) {
            return String::new();
        }
        text
    }
}

fn read_embedded_text(path: &Path) -> (SourceFormat, String) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(file = %redact_path(path), error = %e, "Failed to read document");
            return (SourceFormat::Unknown, String::new());
        }
    };

    let format = detect_format(path, &bytes);
    let text = match format {
        SourceFormat::Text => String::from_utf8(bytes).unwrap_or_default(),
        SourceFormat::Pdf => pdf_text(path, &bytes),
        SourceFormat::Image | SourceFormat::Unknown => String::new(),
    };
    (format, text)
}

/// Detects the format from the extension, falling back to the content for
/// files saved without one (uploads usually are).
fn detect_format(path: &Path, bytes: &[u8]) -> SourceFormat {
    if let Some(mime) = mime_guess::from_path(path).first() {
        if mime.essence_str() == "application/pdf" {
            return SourceFormat::Pdf;
        }
        match mime.type_().as_str() {
            "text" => return SourceFormat::Text,
            "image" => return SourceFormat::Image,
            _ => {}
        }
    }

    if bytes.starts_with(b"%PDF") {
        SourceFormat::Pdf
    } else if std::str::from_utf8(bytes).is_ok() {
        SourceFormat::Text
    } else {
        SourceFormat::Unknown
    }
}

fn pdf_text(path: &Path, bytes: &[u8]) -> String {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(file = %redact_path(path), error = %e, "lopdf failed to parse PDF");
            return String::new();
        }
    };

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    text
}

/// True for empty text, pure font-decoding markers, or text with too few
/// alphanumeric characters to be anything but garbage.
fn is_unusable(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    total_chars > MIN_TOTAL_CHARS && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}
