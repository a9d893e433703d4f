//! Read-side views over the ledger tables.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::chain_repo::{ChainDocumentRow, ChainRow, ChainStatus};

/// A chain as reported to users. `status` is the effective status: an active
/// chain older than the overdue threshold is reported as overdue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummary {
    pub id: i64,
    pub contract_number: String,
    pub counterparty: String,
    pub total_amount: f64,
    pub closed_amount: f64,
    pub remaining_amount: f64,
    pub status: ChainStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl ChainSummary {
    pub fn from_row(row: ChainRow, now: DateTime<Utc>, overdue_after_days: i64) -> Self {
        let status = effective_status(&row, now, overdue_after_days);
        Self {
            id: row.id,
            remaining_amount: row.remaining_amount(),
            contract_number: row.contract_number,
            counterparty: row.counterparty,
            total_amount: row.total_amount,
            closed_amount: row.closed_amount,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Overdue is never stored; it is derived from the chain's age when read.
pub fn effective_status(row: &ChainRow, now: DateTime<Utc>, overdue_after_days: i64) -> ChainStatus {
    if row.status != ChainStatus::Active {
        return row.status;
    }
    match DateTime::parse_from_rfc3339(&row.created_at) {
        Ok(created) if now.signed_duration_since(created) > Duration::days(overdue_after_days) => {
            ChainStatus::Overdue
        }
        _ => ChainStatus::Active,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDetail {
    pub chain: ChainSummary,
    pub invoice_count: i64,
    pub closing_count: i64,
    /// Linked documents ordered by document date.
    pub documents: Vec<ChainDocumentRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub documents: i64,
    pub counterparties: i64,
    pub chains: i64,
    pub unclosed_chains: i64,
    pub total_document_amount: f64,
    pub unclosed_remaining_amount: f64,
}
