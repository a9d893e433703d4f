//! Counterparty repository. Rows are aggregates fed by saved documents and
//! only ever grow.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now_timestamp, DatabaseError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartyRow {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    pub first_document_date: Option<String>,
    pub last_document_date: Option<String>,
    pub total_amount: f64,
    pub document_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Counterparty aggregate with per-role document breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterpartySummaryRow {
    #[serde(flatten)]
    pub counterparty: CounterpartyRow,
    pub contract_count: i64,
    pub contract_amount: f64,
    pub invoice_count: i64,
    pub invoice_amount: f64,
    pub closing_count: i64,
    pub closing_amount: f64,
}

const SELECT_COLUMNS: &str = "c.id, c.name, c.tax_id, c.first_document_date,
    c.last_document_date, c.total_amount, c.document_count, c.created_at, c.updated_at";

/// Finds the row for a counterparty, matching by tax id or by name.
/// A tax id match wins over a name match.
pub fn find(
    conn: &Connection,
    name: &str,
    tax_id: Option<&str>,
) -> Result<Option<CounterpartyRow>, DatabaseError> {
    let sql = format!(
        "SELECT {} FROM counterparties c
         WHERE (?1 IS NOT NULL AND c.tax_id = ?1) OR c.name = ?2
         ORDER BY (c.tax_id IS ?1) DESC, c.id
         LIMIT 1",
        SELECT_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![tax_id, name], read_row)
        .optional()?)
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<CounterpartyRow>, DatabaseError> {
    let sql = format!("SELECT {} FROM counterparties c WHERE c.id = ?1", SELECT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], read_row).optional()?)
}

/// Adds one document to the counterparty's aggregates, creating the row on
/// first sighting. Returns the counterparty id.
///
/// `date` must be ISO formatted for first/last tracking to order correctly.
pub fn upsert(
    conn: &Connection,
    name: &str,
    tax_id: Option<&str>,
    amount: Option<f64>,
    date: Option<&str>,
) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    let amount = amount.unwrap_or(0.0);

    if let Some(existing) = find(conn, name, tax_id)? {
        conn.execute(
            "UPDATE counterparties SET
               document_count = document_count + 1,
               total_amount = total_amount + ?1,
               tax_id = COALESCE(tax_id, ?2),
               first_document_date = CASE
                 WHEN ?3 IS NULL THEN first_document_date
                 WHEN first_document_date IS NULL OR ?3 < first_document_date THEN ?3
                 ELSE first_document_date END,
               last_document_date = CASE
                 WHEN ?3 IS NULL THEN last_document_date
                 WHEN last_document_date IS NULL OR ?3 > last_document_date THEN ?3
                 ELSE last_document_date END,
               updated_at = ?4
             WHERE id = ?5",
            params![amount, tax_id, date, now, existing.id],
        )?;
        return Ok(existing.id);
    }

    conn.execute(
        "INSERT INTO counterparties (name, tax_id, first_document_date, last_document_date,
         total_amount, document_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3, ?4, 1, ?5, ?5)",
        params![name, tax_id, date, amount, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Lists counterparties with a per-role breakdown, largest total first.
///
/// `filter` matches a case-insensitive name substring or an exact tax id.
pub fn list_with_breakdown(
    conn: &Connection,
    filter: Option<&str>,
) -> Result<Vec<CounterpartySummaryRow>, DatabaseError> {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty());
    let sql = format!(
        "SELECT {},
           COALESCE(SUM(CASE WHEN d.doc_type = 'contract' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN d.doc_type = 'contract' THEN COALESCE(d.amount, 0) ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN d.doc_type = 'invoice' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN d.doc_type = 'invoice' THEN COALESCE(d.amount, 0) ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN d.doc_type IN ('act', 'waybill', 'tax_invoice', 'universal_transfer')
                        THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN d.doc_type IN ('act', 'waybill', 'tax_invoice', 'universal_transfer')
                        THEN COALESCE(d.amount, 0) ELSE 0 END), 0)
         FROM counterparties c
         LEFT JOIN documents d ON d.counterparty_id = c.id
         GROUP BY c.id
         ORDER BY c.total_amount DESC, c.name",
        SELECT_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(CounterpartySummaryRow {
                counterparty: read_row(row)?,
                contract_count: row.get(9)?,
                contract_amount: row.get(10)?,
                invoice_count: row.get(11)?,
                invoice_amount: row.get(12)?,
                closing_count: row.get(13)?,
                closing_amount: row.get(14)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    // SQLite's lower() only folds ASCII, so Cyrillic names are matched here.
    let Some(filter) = filter else {
        return Ok(rows);
    };
    let needle = filter.to_lowercase();
    Ok(rows
        .into_iter()
        .filter(|r| {
            r.counterparty.tax_id.as_deref() == Some(filter)
                || r.counterparty.name.to_lowercase().contains(&needle)
        })
        .collect())
}

pub fn count(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM counterparties", [], |r| r.get(0))?)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<CounterpartyRow> {
    Ok(CounterpartyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        tax_id: row.get(2)?,
        first_document_date: row.get(3)?,
        last_document_date: row.get(4)?,
        total_amount: row.get(5)?,
        document_count: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_first_sighting_creates_row() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = upsert(conn, "ООО Альфа", Some("7707083893"), Some(1000.0), Some("2024-03-01"))?;
            let row = get(conn, id)?.unwrap();
            assert_eq!(row.document_count, 1);
            assert_eq!(row.total_amount, 1000.0);
            assert_eq!(row.first_document_date.as_deref(), Some("2024-03-01"));
            assert_eq!(row.last_document_date.as_deref(), Some("2024-03-01"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_aggregates_grow_and_track_date_range() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = upsert(conn, "ООО Альфа", Some("7707083893"), Some(1000.0), Some("2024-03-01"))?;
            let again = upsert(conn, "ООО Альфа", Some("7707083893"), None, Some("2024-01-10"))?;
            let third = upsert(conn, "ООО Альфа", Some("7707083893"), Some(500.0), Some("2024-05-20"))?;
            assert_eq!(id, again);
            assert_eq!(id, third);

            let row = get(conn, id)?.unwrap();
            assert_eq!(row.document_count, 3);
            assert_eq!(row.total_amount, 1500.0);
            assert_eq!(row.first_document_date.as_deref(), Some("2024-01-10"));
            assert_eq!(row.last_document_date.as_deref(), Some("2024-05-20"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_matches_by_name_and_backfills_tax_id() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = upsert(conn, "ИП Петров", None, Some(100.0), None)?;
            let same = upsert(conn, "ИП Петров", Some("500100732259"), Some(200.0), None)?;
            assert_eq!(id, same);
            let row = get(conn, id)?.unwrap();
            assert_eq!(row.tax_id.as_deref(), Some("500100732259"));
            assert_eq!(count(conn)?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_tax_id_match_wins_over_name() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let by_name = upsert(conn, "ООО Бета", None, None, None)?;
            let by_tax = upsert(conn, "ООО Гамма", Some("7707083893"), None, None)?;
            assert_ne!(by_name, by_tax);

            let matched = find(conn, "ООО Бета", Some("7707083893"))?.unwrap();
            assert_eq!(matched.id, by_tax);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_list_filter_by_name_or_tax_id() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            upsert(conn, "ООО Альфа", Some("7707083893"), Some(10.0), None)?;
            upsert(conn, "ИП Петров", None, Some(20.0), None)?;

            let all = list_with_breakdown(conn, None)?;
            assert_eq!(all.len(), 2);
            assert_eq!(all[0].counterparty.name, "ИП Петров");

            let by_tax = list_with_breakdown(conn, Some("7707083893"))?;
            assert_eq!(by_tax.len(), 1);
            assert_eq!(by_tax[0].counterparty.name, "ООО Альфа");

            let by_name = list_with_breakdown(conn, Some("петров"))?;
            assert_eq!(by_name.len(), 1);
            assert_eq!(by_name[0].contract_count, 0);
            Ok(())
        })
        .unwrap();
    }
}
