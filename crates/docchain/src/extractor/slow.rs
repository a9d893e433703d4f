//! Prompt construction and response parsing for inference-assisted
//! extraction.

use crate::document_type::DocumentType;
use crate::fields::{ExtractedFields, FieldName};
use crate::inference::extract_json_object;

/// Longest reference snippet copied into a prompt.
const MAX_REFERENCE_CHARS: usize = 500;

/// Builds the prompt for one window, asking only for `fields`.
pub fn build_prompt(
    window: &str,
    fields: &[FieldName],
    doc_type: Option<DocumentType>,
    reference_context: &[String],
) -> String {
    let mut prompt = String::from(
        "Extract the following fields from a Russian business document fragment.\n",
    );
    if let Some(doc_type) = doc_type {
        prompt.push_str(&format!("Document type: {}\n", doc_type));
    }

    prompt.push_str("Fields:\n");
    for field in fields {
        prompt.push_str(&format!("- {}: {}\n", field.key(), field.description()));
    }

    if !reference_context.is_empty() {
        prompt.push_str("\nPreviously stored documents for reference:\n");
        for snippet in reference_context {
            let snippet: String = snippet.chars().take(MAX_REFERENCE_CHARS).collect();
            prompt.push_str(&format!("---\n{}\n", snippet));
        }
    }

    prompt.push_str(
        "\nAnswer with a single JSON object using exactly the field names above. \
         Use null for a field that is not present in the fragment. Do not guess.\n",
    );
    prompt.push_str("\nFragment:\n");
    prompt.push_str(window);
    prompt.push('\n');
    prompt
}

/// Reads the fields out of a completion. Only the requested fields are
/// kept; `None` means the completion held no usable JSON object.
pub fn parse_response(response: &str, requested: &[FieldName]) -> Option<ExtractedFields> {
    let value = extract_json_object(response)?;
    let parsed = ExtractedFields::from_json(&value);

    let mut fields = ExtractedFields::default();
    for field in requested {
        if let Some(v) = parsed.get(*field) {
            fields.set(*field, v);
        }
    }
    Some(fields)
}
