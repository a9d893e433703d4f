//! Texts sent to submitters at each step of a task's life.

use std::fmt::Write;

use crate::document_type::{DocumentType, LinkType};
use crate::fields::{ExtractedFields, FieldName};
use crate::ledger::ChainOutcome;

/// Why a task failed, as far as the submitter is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason<'a> {
    /// The document could not be read; the detail is safe to show.
    Unreadable(&'a str),
    /// Anything else. Details stay in the log.
    Internal,
}

/// What a completed task reports back.
#[derive(Debug, Clone)]
pub struct CompletionSummary<'a> {
    pub doc_type: DocumentType,
    pub fields: &'a ExtractedFields,
    pub document_id: i64,
    pub processing_secs: f64,
    pub chain_note: Option<String>,
    pub warnings: &'a [String],
}

/// First eight characters of a task id, enough to tell tasks apart in chat.
pub fn short_id(task_id: &str) -> &str {
    task_id.get(..8).unwrap_or(task_id)
}

pub fn queued(filename: &str, task_id: &str) -> String {
    format!(
        "Document '{}' added to the processing queue (id {})",
        filename,
        short_id(task_id)
    )
}

pub fn started(filename: &str, task_id: &str) -> String {
    format!(
        "Started processing document '{}' (id {})",
        filename,
        short_id(task_id)
    )
}

pub fn type_detected(filename: &str, doc_type: DocumentType) -> String {
    format!("Document '{}' detected as {}", filename, doc_type)
}

pub fn completed(filename: &str, summary: &CompletionSummary<'_>) -> String {
    let mut msg = format!("Document '{}' processed successfully.\n\n", filename);
    let _ = writeln!(msg, "Type: {}", summary.doc_type);
    for field in [
        FieldName::Counterparty,
        FieldName::TaxId,
        FieldName::DocumentNumber,
        FieldName::Date,
        FieldName::Amount,
        FieldName::ContractNumber,
    ] {
        if let Some(value) = summary.fields.get(field) {
            let _ = writeln!(msg, "{}: {}", label(field), value);
        }
    }
    if let Some(note) = &summary.chain_note {
        let _ = writeln!(msg, "Chain: {}", note);
    }
    let _ = writeln!(msg, "\nLedger id: {}", summary.document_id);
    let _ = writeln!(msg, "Processing time: {:.1} s", summary.processing_secs);
    push_list(&mut msg, "Warnings", summary.warnings);
    msg
}

pub fn validation_failed(filename: &str, errors: &[String], warnings: &[String]) -> String {
    let mut msg = format!("Document '{}' failed validation.\n", filename);
    push_list(&mut msg, "Errors", errors);
    push_list(&mut msg, "Warnings", warnings);
    msg
}

pub fn failed(filename: &str, reason: FailureReason<'_>) -> String {
    match reason {
        FailureReason::Unreadable(detail) => format!(
            "Could not read document '{}': {}.\n\n\
             Check that the scan is legible and try sending it again.",
            filename, detail
        ),
        FailureReason::Internal => format!(
            "Internal error while processing document '{}'. Please try again later.",
            filename
        ),
    }
}

/// One line describing what a save did to the business chains.
pub fn chain_note(
    outcome: &ChainOutcome,
    doc_type: DocumentType,
    contract_number: Option<&str>,
) -> Option<String> {
    let contract = contract_number.unwrap_or("?");
    match outcome {
        ChainOutcome::Created { .. } => Some(format!("opened for contract {}", contract)),
        ChainOutcome::Superseded { .. } => {
            Some(format!("contract {} replaced by a newer version", contract))
        }
        ChainOutcome::Linked { link_type, .. } => {
            let role = match link_type {
                LinkType::Invoice => "invoice",
                LinkType::Closing => "closing document",
                LinkType::Contract => "contract",
            };
            Some(format!("{} linked to contract {}", role, contract))
        }
        ChainOutcome::Unlinked if doc_type == DocumentType::Contract => {
            Some("no counterparty, chain not opened".to_string())
        }
        ChainOutcome::Unlinked if doc_type.link_type().is_some() => Some(match contract_number {
            Some(number) => format!("no open chain for contract {}", number),
            None => "no contract number, not linked".to_string(),
        }),
        ChainOutcome::Unlinked => None,
    }
}

fn label(field: FieldName) -> &'static str {
    match field {
        FieldName::TaxId => "Tax id",
        FieldName::Counterparty => "Counterparty",
        FieldName::DocumentNumber => "Number",
        FieldName::Date => "Date",
        FieldName::Amount => "Amount",
        FieldName::Subject => "Subject",
        FieldName::ContractNumber => "Contract",
    }
}

fn push_list(msg: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(msg, "\n{}:", title);
    for item in items {
        let _ = writeln!(msg, "- {}", item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_completed_lists_found_fields_and_warnings() {
        let fields = ExtractedFields {
            counterparty: Some("ООО Поставщик".to_string()),
            amount: Some("1000000".to_string()),
            ..Default::default()
        };
        let warnings = vec!["tax id checksum mismatch".to_string()];
        let msg = completed(
            "dogovor.pdf",
            &CompletionSummary {
                doc_type: DocumentType::Contract,
                fields: &fields,
                document_id: 7,
                processing_secs: 1.25,
                chain_note: Some("opened Д-2024-001".to_string()),
                warnings: &warnings,
            },
        );
        assert!(msg.contains("Type: contract"));
        assert!(msg.contains("Counterparty: ООО Поставщик"));
        assert!(!msg.contains("Number:"));
        assert!(msg.contains("Chain: opened Д-2024-001"));
        assert!(msg.contains("Ledger id: 7"));
        assert!(msg.contains("Processing time: 1.2 s") || msg.contains("Processing time: 1.3 s"));
        assert!(msg.contains("- tax id checksum mismatch"));
    }

    #[test]
    fn test_validation_failed_lists_errors() {
        let msg = validation_failed(
            "upd.pdf",
            &["invalid tax id length: 123 has 3 digits (expected 10 or 12 digits)".to_string()],
            &[],
        );
        assert!(msg.contains("Errors:"));
        assert!(msg.contains("invalid tax id length"));
        assert!(!msg.contains("Warnings:"));
    }

    #[test]
    fn test_chain_note() {
        let linked = ChainOutcome::Linked {
            chain_id: 1,
            link_type: LinkType::Closing,
        };
        assert_eq!(
            chain_note(&linked, DocumentType::Act, Some("Д-1")).as_deref(),
            Some("closing document linked to contract Д-1")
        );
        assert_eq!(
            chain_note(&ChainOutcome::Unlinked, DocumentType::Invoice, None).as_deref(),
            Some("no contract number, not linked")
        );
        assert!(chain_note(&ChainOutcome::Unlinked, DocumentType::Other, None).is_none());
    }

    #[test]
    fn test_failure_kinds_are_distinguished() {
        let unreadable = failed("scan.jpg", FailureReason::Unreadable("no text found"));
        assert!(unreadable.starts_with("Could not read document"));
        assert!(unreadable.contains("no text found"));

        let internal = failed("scan.jpg", FailureReason::Internal);
        assert!(internal.starts_with("Internal error"));
    }
}
