//! Append-only audit trail.
//!
//! Rows are never updated or deleted; triggers on `audit_log` abort any
//! attempt to do so.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};
use crate::document::keys;
use crate::document::{AuditEntry, AuditEventType};

impl ToSql for AuditEventType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AuditEventType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

fn from_row(row: &Row<'_>) -> Result<AuditEntry, rusqlite::Error> {
    let details: String = row.get("details")?;
    let details = serde_json::from_str(&details)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(AuditEntry {
        pk: row.get("pk")?,
        sk: row.get("sk")?,
        document_id: row.get("document_id")?,
        event_type: row.get("event_type")?,
        timestamp: row.get("timestamp")?,
        details,
    })
}

/// Inserts an entry on an already-locked connection (or transaction).
/// Returns the arrival sequence number.
pub(crate) fn insert_entry(conn: &Connection, entry: &AuditEntry) -> Result<i64, DatabaseError> {
    let details = serde_json::to_string(&entry.details)?;
    conn.execute(
        "INSERT INTO audit_log (pk, sk, document_id, event_type, timestamp, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.pk,
            entry.sk,
            entry.document_id,
            entry.event_type,
            entry.timestamp,
            details,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Appends an audit entry.
pub fn append(db: &Database, entry: &AuditEntry) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| insert_entry(conn, entry))
}

/// All audit entries of a document, ordered by sort key and then by
/// arrival, so entries with equal timestamps keep their write order.
pub fn list_for_document(db: &Database, document_id: &str) -> Result<Vec<AuditEntry>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT pk, sk, document_id, event_type, timestamp, details
             FROM audit_log WHERE pk = ?1 ORDER BY sk, seq",
        )?;
        let rows = stmt
            .query_map(params![keys::partition_key(document_id)], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts a document's audit entries, optionally of a single type.
pub fn count_for_document(
    db: &Database,
    document_id: &str,
    event_type: Option<AuditEventType>,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE pk = ?1 AND (?2 IS NULL OR event_type = ?2)",
            params![keys::partition_key(document_id), event_type],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    })
}
