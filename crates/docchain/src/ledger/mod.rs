//! Ledger store: persists validated documents and keeps counterparty
//! aggregates and business chains consistent with them.
//!
//! `save_document` is the only write path. The archive copy is made first;
//! the document row, counterparty upsert and chain update then commit in one
//! transaction, and the copy is discarded if that transaction fails.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::chain_repo::{self, ChainStatus};
use crate::db::counterparty_repo::{self, CounterpartySummaryRow};
use crate::db::document_repo::{self, NewDocument};
use crate::db::{Database, DatabaseError};
use crate::document_type::{DocumentType, LinkType};
use crate::error::StorageError;
use crate::extractor::amount::parse_amount;
use crate::extractor::dates;
use crate::fields::ExtractedFields;
use crate::validator::tax_id;

pub mod archive;
pub mod reports;

pub use archive::DocumentArchive;
pub use reports::{ChainDetail, ChainSummary, DatabaseStats};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Archive error: {0}")]
    Storage(#[from] StorageError),
}

/// Everything needed to persist one validated document.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub file_path: PathBuf,
    pub original_filename: String,
    pub doc_type: DocumentType,
    pub fields: ExtractedFields,
    pub submitter_id: String,
}

/// What a save did to the business chains.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainOutcome {
    /// A contract opened a new chain.
    Created { chain_id: i64 },
    /// A contract replaced the originating contract of an existing chain.
    Superseded { chain_id: i64 },
    /// An invoice or closing document attached to an existing chain.
    Linked { chain_id: i64, link_type: LinkType },
    /// The document does not belong to any chain.
    Unlinked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDocument {
    pub document_id: i64,
    pub storage_path: PathBuf,
    pub chain: ChainOutcome,
}

/// Write side of the ledger, as used by the pipeline.
pub trait LedgerStore: Send + Sync {
    fn save_document(&self, request: &SaveRequest) -> Result<SavedDocument, LedgerError>;

    /// Short descriptions of recently saved documents of a type, shown to
    /// the inference backend as examples.
    fn reference_context(
        &self,
        doc_type: DocumentType,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError>;
}

/// Read side of the ledger.
pub trait LedgerReports: Send + Sync {
    fn list_counterparties(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<CounterpartySummaryRow>, LedgerError>;

    fn list_unclosed_chains(&self) -> Result<Vec<ChainSummary>, LedgerError>;

    fn chain_detail(&self, contract_number: &str) -> Result<Option<ChainDetail>, LedgerError>;

    fn database_stats(&self) -> Result<DatabaseStats, LedgerError>;
}

pub struct SqliteLedger {
    db: Database,
    archive: DocumentArchive,
    overdue_after_days: i64,
}

impl SqliteLedger {
    pub fn new<P: AsRef<Path>>(db: Database, storage_root: P, overdue_after_days: i64) -> Self {
        Self {
            db,
            archive: DocumentArchive::new(storage_root),
            overdue_after_days,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn archive(&self) -> &DocumentArchive {
        &self.archive
    }
}

impl LedgerStore for SqliteLedger {
    fn save_document(&self, request: &SaveRequest) -> Result<SavedDocument, LedgerError> {
        let storage_path = self.archive.store(
            &request.file_path,
            request.doc_type,
            request.fields.counterparty.as_deref(),
            &request.original_filename,
        )?;

        let result = self
            .db
            .transaction(|conn| record_document(conn, request, &storage_path));

        match result {
            Ok((document_id, chain)) => {
                log::info!(
                    "Saved {} document {} ({:?})",
                    request.doc_type,
                    document_id,
                    chain
                );
                Ok(SavedDocument {
                    document_id,
                    storage_path,
                    chain,
                })
            }
            Err(e) => {
                log::error!("Ledger save failed, discarding archived copy: {}", e);
                self.archive.discard(&storage_path);
                Err(e)
            }
        }
    }

    fn reference_context(
        &self,
        doc_type: DocumentType,
        limit: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let rows = self
            .db
            .with_conn(|conn| document_repo::list_recent(conn, doc_type, limit))?;

        Ok(rows
            .into_iter()
            .map(|d| {
                let mut parts = vec![d.doc_type.to_string()];
                let labelled = [
                    ("counterparty", d.counterparty),
                    ("tax_id", d.tax_id),
                    ("document_number", d.document_number),
                    ("date", d.document_date),
                    ("amount", d.amount.map(|a| format!("{:.2}", a))),
                    ("contract_number", d.contract_number),
                ];
                for (key, value) in labelled {
                    if let Some(value) = value {
                        parts.push(format!("{}: {}", key, value));
                    }
                }
                parts.join("; ")
            })
            .collect())
    }
}

/// The transactional part of a save. Returns the new document id and what
/// happened to the chain.
fn record_document(
    conn: &Connection,
    request: &SaveRequest,
    storage_path: &Path,
) -> Result<(i64, ChainOutcome), LedgerError> {
    let fields = &request.fields;
    let amount = fields.amount.as_deref().and_then(parse_amount);
    let iso_date = fields.date.as_deref().and_then(dates::to_iso);
    let stored_date = iso_date.clone().or_else(|| fields.date.clone());
    let tax_id = fields
        .tax_id
        .as_deref()
        .map(tax_id::normalize)
        .filter(|t| !t.is_empty());

    let filename = storage_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| request.original_filename.clone());

    let document_id = document_repo::insert(
        conn,
        &NewDocument {
            filename,
            original_filename: request.original_filename.clone(),
            doc_type: request.doc_type,
            counterparty: fields.counterparty.clone(),
            tax_id: tax_id.clone(),
            document_number: fields.document_number.clone(),
            document_date: stored_date,
            amount,
            subject: fields.subject.clone(),
            contract_number: fields.contract_number.clone(),
            storage_path: storage_path.to_string_lossy().to_string(),
            submitter_id: request.submitter_id.clone(),
        },
    )?;

    if let Some(name) = fields.counterparty.as_deref() {
        let counterparty_id =
            counterparty_repo::upsert(conn, name, tax_id.as_deref(), amount, iso_date.as_deref())?;
        document_repo::set_counterparty(conn, document_id, counterparty_id)?;
    }

    let chain = reconcile_chain(
        conn,
        document_id,
        request.doc_type,
        fields,
        amount,
        iso_date.as_deref(),
    )?;

    Ok((document_id, chain))
}

fn reconcile_chain(
    conn: &Connection,
    document_id: i64,
    doc_type: DocumentType,
    fields: &ExtractedFields,
    amount: Option<f64>,
    date: Option<&str>,
) -> Result<ChainOutcome, DatabaseError> {
    let (Some(link_type), Some(contract_number)) =
        (doc_type.link_type(), fields.contract_number.as_deref())
    else {
        return Ok(ChainOutcome::Unlinked);
    };

    let existing = chain_repo::find_by_contract_number(conn, contract_number)?;

    let outcome = match (link_type, existing) {
        (LinkType::Contract, existing) => {
            let Some(counterparty) = fields.counterparty.as_deref() else {
                return Ok(ChainOutcome::Unlinked);
            };
            match existing {
                Some(chain) => {
                    let previous = chain_repo::contract_link_amount(conn, chain.id)?;
                    chain_repo::repoint_contract(conn, chain.id, document_id, amount, date)?;
                    let delta = amount.unwrap_or(0.0) - previous.unwrap_or(0.0);
                    chain_repo::add_to_total(conn, chain.id, delta)?;
                    log::info!(
                        "Contract {} superseded by document {}",
                        contract_number,
                        document_id
                    );
                    ChainOutcome::Superseded { chain_id: chain.id }
                }
                None => {
                    let chain_id = chain_repo::create(
                        conn,
                        contract_number,
                        document_id,
                        counterparty,
                        amount,
                    )?;
                    chain_repo::insert_link(
                        conn,
                        chain_id,
                        document_id,
                        LinkType::Contract,
                        amount,
                        date,
                    )?;
                    ChainOutcome::Created { chain_id }
                }
            }
        }
        (_, None) => {
            log::info!(
                "No chain for contract {}, document {} stays unlinked",
                contract_number,
                document_id
            );
            return Ok(ChainOutcome::Unlinked);
        }
        (link_type, Some(chain)) => {
            chain_repo::insert_link(conn, chain.id, document_id, link_type, amount, date)?;
            let delta = amount.unwrap_or(0.0);
            if link_type == LinkType::Invoice {
                chain_repo::add_to_total(conn, chain.id, delta)?;
            } else {
                chain_repo::add_to_closed(conn, chain.id, delta)?;
            }
            ChainOutcome::Linked {
                chain_id: chain.id,
                link_type,
            }
        }
    };

    let chain_id = match &outcome {
        ChainOutcome::Created { chain_id }
        | ChainOutcome::Superseded { chain_id }
        | ChainOutcome::Linked { chain_id, .. } => *chain_id,
        ChainOutcome::Unlinked => return Ok(outcome),
    };
    let status = chain_repo::refresh_status(conn, chain_id)?;
    if status == ChainStatus::Closed {
        log::info!("Chain {} is fully closed", contract_number);
    }

    Ok(outcome)
}

impl LedgerReports for SqliteLedger {
    fn list_counterparties(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<CounterpartySummaryRow>, LedgerError> {
        Ok(self
            .db
            .with_conn(|conn| counterparty_repo::list_with_breakdown(conn, filter))?)
    }

    fn list_unclosed_chains(&self) -> Result<Vec<ChainSummary>, LedgerError> {
        let rows = self.db.with_conn(chain_repo::list_unclosed)?;
        let now = Utc::now();
        Ok(rows
            .into_iter()
            .map(|row| ChainSummary::from_row(row, now, self.overdue_after_days))
            .collect())
    }

    fn chain_detail(&self, contract_number: &str) -> Result<Option<ChainDetail>, LedgerError> {
        let found = self.db.with_conn(|conn| {
            let Some(chain) = chain_repo::find_by_contract_number(conn, contract_number)? else {
                return Ok(None);
            };
            let documents = chain_repo::list_documents(conn, chain.id)?;
            let (_, invoices, closings) = chain_repo::link_counts(conn, chain.id)?;
            Ok(Some((chain, documents, invoices, closings)))
        })?;

        Ok(found.map(|(chain, documents, invoice_count, closing_count)| ChainDetail {
            chain: ChainSummary::from_row(chain, Utc::now(), self.overdue_after_days),
            invoice_count,
            closing_count,
            documents,
        }))
    }

    fn database_stats(&self) -> Result<DatabaseStats, LedgerError> {
        Ok(self.db.with_conn(|conn| {
            let (chains, unclosed_chains, unclosed_remaining_amount) = chain_repo::totals(conn)?;
            Ok(DatabaseStats {
                documents: document_repo::count(conn)?,
                counterparties: counterparty_repo::count(conn)?,
                chains,
                unclosed_chains,
                total_document_amount: document_repo::total_amount(conn)?,
                unclosed_remaining_amount,
            })
        })?)
    }
}
