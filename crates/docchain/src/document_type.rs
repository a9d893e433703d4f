//! Closed set of document types recognised by the pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Document type label assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Contract,
    Invoice,
    Act,
    Waybill,
    TaxInvoice,
    UniversalTransfer,
    Other,
}

/// How a persisted document participates in a business chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Contract,
    Invoice,
    Closing,
}

impl DocumentType {
    pub const ALL: [DocumentType; 7] = [
        DocumentType::Contract,
        DocumentType::Invoice,
        DocumentType::Act,
        DocumentType::Waybill,
        DocumentType::TaxInvoice,
        DocumentType::UniversalTransfer,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Contract => "contract",
            DocumentType::Invoice => "invoice",
            DocumentType::Act => "act",
            DocumentType::Waybill => "waybill",
            DocumentType::TaxInvoice => "tax_invoice",
            DocumentType::UniversalTransfer => "universal_transfer",
            DocumentType::Other => "other",
        }
    }

    /// Parses a label loosely: case, hyphens and spaces are ignored, and the
    /// common Russian names are accepted alongside the English ones.
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
            .to_lowercase()
            .replace(['-', ' '], "_");

        let doc_type = match normalized.as_str() {
            "contract" | "agreement" | "договор" | "контракт" => DocumentType::Contract,
            "invoice" | "bill" | "счет" | "счёт" | "счет_на_оплату" | "счёт_на_оплату" => {
                DocumentType::Invoice
            }
            "act" | "акт" => DocumentType::Act,
            "waybill" | "накладная" | "товарная_накладная" => DocumentType::Waybill,
            "tax_invoice" | "taxinvoice" | "счет_фактура" | "счёт_фактура" => {
                DocumentType::TaxInvoice
            }
            "universal_transfer" | "universal_transfer_document" | "utd" | "упд" => {
                DocumentType::UniversalTransfer
            }
            "other" | "unknown" | "иные" | "прочее" => DocumentType::Other,
            _ => return None,
        };
        Some(doc_type)
    }

    /// Chain link created when a document of this type is persisted, if any.
    pub fn link_type(&self) -> Option<LinkType> {
        match self {
            DocumentType::Contract => Some(LinkType::Contract),
            DocumentType::Invoice => Some(LinkType::Invoice),
            DocumentType::Act
            | DocumentType::Waybill
            | DocumentType::TaxInvoice
            | DocumentType::UniversalTransfer => Some(LinkType::Closing),
            DocumentType::Other => None,
        }
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.link_type(), Some(LinkType::Closing))
    }

    /// Folder name used by the document archive.
    pub fn storage_folder(&self) -> &'static str {
        match self {
            DocumentType::Contract => "contracts",
            DocumentType::Invoice => "invoices",
            DocumentType::Act => "acts",
            DocumentType::Waybill => "waybills",
            DocumentType::TaxInvoice => "tax-invoices",
            DocumentType::UniversalTransfer => "utd",
            DocumentType::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_label(s).ok_or_else(|| format!("unknown document type: {}", s))
    }
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Contract => "contract",
            LinkType::Invoice => "invoice",
            LinkType::Closing => "closing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contract" => Some(LinkType::Contract),
            "invoice" => Some(LinkType::Invoice),
            "closing" => Some(LinkType::Closing),
            _ => None,
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
