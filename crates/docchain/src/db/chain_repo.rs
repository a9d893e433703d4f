//! Business chain repository: chains keyed by contract number and the links
//! attaching documents to them.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now_timestamp, DatabaseError};
use crate::document_type::{DocumentType, LinkType};

/// Persisted chain status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    Active,
    Closed,
    Overdue,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStatus::Active => "active",
            ChainStatus::Closed => "closed",
            ChainStatus::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ChainStatus::Active),
            "closed" => Some(ChainStatus::Closed),
            "overdue" => Some(ChainStatus::Overdue),
            _ => None,
        }
    }

    /// Status implied by the chain's balances.
    pub fn from_amounts(total_amount: f64, closed_amount: f64) -> Self {
        if closed_amount > 0.0 && total_amount - closed_amount <= 0.0 {
            ChainStatus::Closed
        } else {
            ChainStatus::Active
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRow {
    pub id: i64,
    pub contract_number: String,
    pub contract_doc_id: i64,
    pub counterparty: String,
    pub total_amount: f64,
    pub closed_amount: f64,
    pub status: ChainStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl ChainRow {
    pub fn remaining_amount(&self) -> f64 {
        self.total_amount - self.closed_amount
    }
}

/// A document attached to a chain, as shown in chain detail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDocumentRow {
    pub document_id: i64,
    pub link_type: LinkType,
    pub doc_type: DocumentType,
    pub document_number: Option<String>,
    pub date: Option<String>,
    pub amount: Option<f64>,
    pub subject: Option<String>,
}

const SELECT_COLUMNS: &str = "id, contract_number, contract_doc_id, counterparty, total_amount,
    closed_amount, status, created_at, updated_at";

pub fn find_by_contract_number(
    conn: &Connection,
    contract_number: &str,
) -> Result<Option<ChainRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM business_chains WHERE contract_number = ?1",
        SELECT_COLUMNS
    );
    let raw = conn
        .query_row(&sql, params![contract_number], read_raw)
        .optional()?;
    raw.map(RawChain::into_row).transpose()
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<ChainRow>, DatabaseError> {
    let sql = format!("SELECT {} FROM business_chains WHERE id = ?1", SELECT_COLUMNS);
    let raw = conn.query_row(&sql, params![id], read_raw).optional()?;
    raw.map(RawChain::into_row).transpose()
}

/// Creates a chain whose total starts at the contract amount. Returns the
/// chain id.
pub fn create(
    conn: &Connection,
    contract_number: &str,
    contract_doc_id: i64,
    counterparty: &str,
    amount: Option<f64>,
) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO business_chains (contract_number, contract_doc_id, counterparty,
         total_amount, closed_amount, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?6)",
        params![
            contract_number,
            contract_doc_id,
            counterparty,
            amount.unwrap_or(0.0),
            ChainStatus::Active.as_str(),
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_link(
    conn: &Connection,
    chain_id: i64,
    document_id: i64,
    link_type: LinkType,
    amount: Option<f64>,
    date: Option<&str>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO chain_links (chain_id, document_id, link_type, amount, link_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chain_id,
            document_id,
            link_type.as_str(),
            amount,
            date,
            now_timestamp()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Adds `delta` to the invoiced total.
pub fn add_to_total(conn: &Connection, chain_id: i64, delta: f64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE business_chains SET total_amount = total_amount + ?1, updated_at = ?2 WHERE id = ?3",
        params![delta, now_timestamp(), chain_id],
    )?;
    Ok(())
}

/// Adds `delta` to the closed total.
pub fn add_to_closed(conn: &Connection, chain_id: i64, delta: f64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE business_chains SET closed_amount = closed_amount + ?1, updated_at = ?2 WHERE id = ?3",
        params![delta, now_timestamp(), chain_id],
    )?;
    Ok(())
}

/// Amount recorded on the chain's contract link, if any.
pub fn contract_link_amount(conn: &Connection, chain_id: i64) -> Result<Option<f64>, DatabaseError> {
    let amount: Option<Option<f64>> = conn
        .query_row(
            "SELECT amount FROM chain_links WHERE chain_id = ?1 AND link_type = 'contract'",
            params![chain_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(amount.flatten())
}

/// Re-points the chain and its single contract link at a newer contract
/// document.
pub fn repoint_contract(
    conn: &Connection,
    chain_id: i64,
    document_id: i64,
    amount: Option<f64>,
    date: Option<&str>,
) -> Result<(), DatabaseError> {
    let now = now_timestamp();
    conn.execute(
        "UPDATE business_chains SET contract_doc_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![document_id, now, chain_id],
    )?;
    let updated = conn.execute(
        "UPDATE chain_links SET document_id = ?1, amount = ?2, link_date = ?3
         WHERE chain_id = ?4 AND link_type = 'contract'",
        params![document_id, amount, date, chain_id],
    )?;
    if updated == 0 {
        insert_link(conn, chain_id, document_id, LinkType::Contract, amount, date)?;
    }
    Ok(())
}

/// Recomputes the persisted status from the current balances.
pub fn refresh_status(conn: &Connection, chain_id: i64) -> Result<ChainStatus, DatabaseError> {
    let (total, closed): (f64, f64) = conn.query_row(
        "SELECT total_amount, closed_amount FROM business_chains WHERE id = ?1",
        params![chain_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    let status = ChainStatus::from_amounts(total, closed);
    conn.execute(
        "UPDATE business_chains SET status = ?1 WHERE id = ?2",
        params![status.as_str(), chain_id],
    )?;
    Ok(status)
}

/// Chains with an outstanding balance, largest remaining first.
pub fn list_unclosed(conn: &Connection) -> Result<Vec<ChainRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM business_chains
         WHERE total_amount > closed_amount
         ORDER BY (total_amount - closed_amount) DESC, contract_number",
        SELECT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let raws = stmt
        .query_map([], read_raw)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawChain::into_row).collect()
}

/// Documents linked to a chain, ordered by document date.
pub fn list_documents(
    conn: &Connection,
    chain_id: i64,
) -> Result<Vec<ChainDocumentRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT l.document_id, l.link_type, d.doc_type, d.document_number,
                COALESCE(d.document_date, l.link_date), COALESCE(d.amount, l.amount), d.subject
         FROM chain_links l
         JOIN documents d ON d.id = l.document_id
         WHERE l.chain_id = ?1
         ORDER BY COALESCE(d.document_date, l.link_date), l.id",
    )?;
    let raws = stmt
        .query_map(params![chain_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raws.into_iter()
        .map(
            |(document_id, link_type, doc_type, document_number, date, amount, subject)| {
                Ok(ChainDocumentRow {
                    document_id,
                    link_type: LinkType::parse(&link_type).ok_or(
                        DatabaseError::InvalidValue {
                            column: "link_type",
                            value: link_type.clone(),
                        },
                    )?,
                    doc_type: DocumentType::parse_label(&doc_type).ok_or(
                        DatabaseError::InvalidValue {
                            column: "doc_type",
                            value: doc_type.clone(),
                        },
                    )?,
                    document_number,
                    date,
                    amount,
                    subject,
                })
            },
        )
        .collect()
}

/// Number of links of each type on a chain, in contract/invoice/closing order.
pub fn link_counts(conn: &Connection, chain_id: i64) -> Result<(i64, i64, i64), DatabaseError> {
    Ok(conn.query_row(
        "SELECT
           COALESCE(SUM(CASE WHEN link_type = 'contract' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN link_type = 'invoice' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN link_type = 'closing' THEN 1 ELSE 0 END), 0)
         FROM chain_links WHERE chain_id = ?1",
        params![chain_id],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?)
}

/// Chain totals: (chain count, unclosed count, sum of unclosed remaining).
pub fn totals(conn: &Connection) -> Result<(i64, i64, f64), DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*),
           COALESCE(SUM(CASE WHEN total_amount > closed_amount THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN total_amount > closed_amount
                        THEN total_amount - closed_amount ELSE 0 END), 0)
         FROM business_chains",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?)
}

struct RawChain {
    row: ChainRow,
    status: String,
}

impl RawChain {
    fn into_row(self) -> Result<ChainRow, DatabaseError> {
        let status = ChainStatus::parse(&self.status).ok_or(DatabaseError::InvalidValue {
            column: "status",
            value: self.status,
        })?;
        Ok(ChainRow { status, ..self.row })
    }
}

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawChain> {
    Ok(RawChain {
        status: row.get(6)?,
        row: ChainRow {
            id: row.get(0)?,
            contract_number: row.get(1)?,
            contract_doc_id: row.get(2)?,
            counterparty: row.get(3)?,
            total_amount: row.get(4)?,
            closed_amount: row.get(5)?,
            status: ChainStatus::Active,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        },
    })
}
