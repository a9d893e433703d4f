//! Document repository. Rows are written once per saved document.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now_timestamp, DatabaseError};
use crate::document_type::DocumentType;

/// Values for a new `documents` row.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub doc_type: DocumentType,
    pub counterparty: Option<String>,
    pub tax_id: Option<String>,
    pub document_number: Option<String>,
    /// ISO `YYYY-MM-DD` when the extracted date parsed, otherwise the raw text.
    pub document_date: Option<String>,
    pub amount: Option<f64>,
    pub subject: Option<String>,
    pub contract_number: Option<String>,
    pub storage_path: String,
    pub submitter_id: String,
}

/// A persisted document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRow {
    pub id: i64,
    pub filename: String,
    pub original_filename: String,
    pub doc_type: DocumentType,
    pub counterparty: Option<String>,
    pub tax_id: Option<String>,
    pub document_number: Option<String>,
    pub document_date: Option<String>,
    pub amount: Option<f64>,
    pub subject: Option<String>,
    pub contract_number: Option<String>,
    pub storage_path: String,
    pub submitter_id: String,
    pub counterparty_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_COLUMNS: &str = "id, filename, original_filename, doc_type, counterparty, tax_id,
    document_number, document_date, amount, subject, contract_number, storage_path,
    submitter_id, counterparty_id, created_at, updated_at";

/// Inserts a document row and returns its id.
pub fn insert(conn: &Connection, doc: &NewDocument) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO documents (filename, original_filename, doc_type, counterparty, tax_id,
         document_number, document_date, amount, subject, contract_number, storage_path,
         submitter_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
        params![
            doc.filename,
            doc.original_filename,
            doc.doc_type.as_str(),
            doc.counterparty,
            doc.tax_id,
            doc.document_number,
            doc.document_date,
            doc.amount,
            doc.subject,
            doc.contract_number,
            doc.storage_path,
            doc.submitter_id,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Points a document at the counterparty row its figures were added to.
pub fn set_counterparty(
    conn: &Connection,
    document_id: i64,
    counterparty_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE documents SET counterparty_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![counterparty_id, now_timestamp(), document_id],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<DocumentRow>, DatabaseError> {
    let sql = format!("SELECT {} FROM documents WHERE id = ?1", SELECT_COLUMNS);
    let raw = conn.query_row(&sql, params![id], read_raw).optional()?;
    raw.map(RawDocument::into_row).transpose()
}

/// Documents referencing a counterparty row, oldest first.
pub fn list_for_counterparty(
    conn: &Connection,
    counterparty_id: i64,
) -> Result<Vec<DocumentRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM documents WHERE counterparty_id = ?1 ORDER BY document_date, id",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
        .query_map(params![counterparty_id], read_raw)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawDocument::into_row).collect()
}

/// Most recently saved documents of one type, newest first.
pub fn list_recent(
    conn: &Connection,
    doc_type: DocumentType,
    limit: usize,
) -> Result<Vec<DocumentRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM documents WHERE doc_type = ?1 ORDER BY id DESC LIMIT ?2",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
        .query_map(params![doc_type.as_str(), limit as i64], read_raw)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawDocument::into_row).collect()
}

pub fn count(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?)
}

/// Sum of all document amounts, missing amounts counted as zero.
pub fn total_amount(conn: &Connection) -> Result<f64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM documents",
        [],
        |r| r.get(0),
    )?)
}

/// Row as read from SQLite, before `doc_type` is mapped back to the enum.
struct RawDocument {
    row: DocumentRow,
    doc_type: String,
}

impl RawDocument {
    fn into_row(self) -> Result<DocumentRow, DatabaseError> {
        let doc_type =
            DocumentType::parse_label(&self.doc_type).ok_or(DatabaseError::InvalidValue {
                column: "doc_type",
                value: self.doc_type,
            })?;
        Ok(DocumentRow {
            doc_type,
            ..self.row
        })
    }
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawDocument> {
    Ok(RawDocument {
        doc_type: row.get(3)?,
        row: DocumentRow {
            id: row.get(0)?,
            filename: row.get(1)?,
            original_filename: row.get(2)?,
            doc_type: DocumentType::Other,
            counterparty: row.get(4)?,
            tax_id: row.get(5)?,
            document_number: row.get(6)?,
            document_date: row.get(7)?,
            amount: row.get(8)?,
            subject: row.get(9)?,
            contract_number: row.get(10)?,
            storage_path: row.get(11)?,
            submitter_id: row.get(12)?,
            counterparty_id: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        },
    })
}

#[cfg(test)]
pub(crate) fn sample(doc_type: DocumentType, amount: Option<f64>) -> NewDocument {
    NewDocument {
        filename: "scan.pdf".to_string(),
        original_filename: "scan.pdf".to_string(),
        doc_type,
        counterparty: Some("ООО Поставщик".to_string()),
        tax_id: Some("7707083893".to_string()),
        document_number: Some("Д-2024-001".to_string()),
        document_date: Some("2024-01-15".to_string()),
        amount,
        subject: None,
        contract_number: Some("Д-2024-001".to_string()),
        storage_path: "/archive/contracts/scan.pdf".to_string(),
        submitter_id: "user-1".to_string(),
    }
}
