//! Metadata record repository: registration, lookup and guarded
//! status transitions on the `documents` table.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};

use super::{audit_repo, Database, DatabaseError};
use crate::document::keys;
use crate::document::{
    AuditEntry, DocumentRecord, DocumentStatus, Transition, TransitionChanges, TransitionGuard,
    TransitionOutcome,
};

impl ToSql for DocumentStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DocumentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

const SELECT_COLUMNS: &str = "pk, sk, document_id, filename, bucket, s3_key, status, version,
    page_count, text_preview, processed_at, processing_version,
    processed_output_bucket, processed_output_key, created_at, updated_at";

fn from_row(row: &Row<'_>) -> Result<DocumentRecord, rusqlite::Error> {
    Ok(DocumentRecord {
        pk: row.get("pk")?,
        sk: row.get("sk")?,
        document_id: row.get("document_id")?,
        filename: row.get("filename")?,
        bucket: row.get("bucket")?,
        s3_key: row.get("s3_key")?,
        status: row.get("status")?,
        version: row.get("version")?,
        page_count: row.get("page_count")?,
        text_preview: row.get("text_preview")?,
        processed_at: row.get("processed_at")?,
        processing_version: row.get("processing_version")?,
        processed_output_bucket: row.get("processed_output_bucket")?,
        processed_output_key: row.get("processed_output_key")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Inserts a freshly registered record and its DOCUMENT_REGISTERED audit
/// entry in one transaction.
///
/// Fails with [`DatabaseError::DuplicateDocument`] if the identity exists.
pub fn register(db: &Database, record: &DocumentRecord) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO documents (pk, sk, document_id, filename, bucket, s3_key,
             status, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.pk,
                record.sk,
                record.document_id,
                record.filename,
                record.bucket,
                record.s3_key,
                record.status,
                record.version,
                record.created_at,
                record.updated_at,
            ],
        )?;
        if inserted == 0 {
            return Err(DatabaseError::DuplicateDocument(record.document_id.clone()));
        }

        audit_repo::insert_entry(&tx, &AuditEntry::registered(record))?;
        tx.commit()?;
        Ok(())
    })
}

/// Looks up the metadata record for an identity.
pub fn find(db: &Database, document_id: &str) -> Result<Option<DocumentRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM documents WHERE pk = ?1 AND sk = ?2",
                    SELECT_COLUMNS
                ),
                params![keys::partition_key(document_id), keys::META_SORT_KEY],
                from_row,
            )
            .optional()?;
        Ok(record)
    })
}

/// Lists records, most recently updated first, optionally filtered by status.
pub fn list(
    db: &Database,
    status: Option<DocumentStatus>,
    limit: u32,
) -> Result<Vec<DocumentRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents
             WHERE sk = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY updated_at DESC, document_id
             LIMIT ?3",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![keys::META_SORT_KEY, status, limit], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Applies a status transition and appends its audit entry in one
/// transaction.
///
/// With [`TransitionGuard::ExpectCurrent`] the write only happens when the
/// stored status equals `transition.from`. When nothing was written, a
/// follow-up read under the same lock tells a status mismatch apart from
/// a missing record, and no audit entry is written. If the audit insert
/// fails the status update is rolled back, so a redelivery finds the
/// record unchanged.
pub fn apply_transition(
    db: &Database,
    document_id: &str,
    transition: &Transition,
    guard: TransitionGuard,
    audit: &AuditEntry,
) -> Result<TransitionOutcome, DatabaseError> {
    let pk = keys::partition_key(document_id);
    let expected = match guard {
        TransitionGuard::ExpectCurrent => Some(transition.from),
        TransitionGuard::Unconditional => None,
    };

    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let changed = match &transition.changes {
            TransitionChanges::Uploaded {
                page_count,
                text_preview,
            } => tx.execute(
                "UPDATE documents
                 SET status = ?3, updated_at = ?4, page_count = ?5, text_preview = ?6
                 WHERE pk = ?1 AND sk = ?2 AND (?7 IS NULL OR status = ?7)",
                params![
                    pk,
                    keys::META_SORT_KEY,
                    transition.to,
                    transition.updated_at,
                    page_count,
                    text_preview,
                    expected,
                ],
            )?,
            TransitionChanges::Processed {
                processed_at,
                processing_version,
                output,
            } => tx.execute(
                "UPDATE documents
                 SET status = ?3, updated_at = ?4, processed_at = ?5, processing_version = ?6,
                     processed_output_bucket = ?7, processed_output_key = ?8
                 WHERE pk = ?1 AND sk = ?2 AND (?9 IS NULL OR status = ?9)",
                params![
                    pk,
                    keys::META_SORT_KEY,
                    transition.to,
                    transition.updated_at,
                    processed_at,
                    processing_version,
                    output.bucket,
                    output.key,
                    expected,
                ],
            )?,
        };

        if changed > 0 {
            audit_repo::insert_entry(&tx, audit)?;
            tx.commit()?;
            return Ok(TransitionOutcome::Applied);
        }

        let current: Option<DocumentStatus> = tx
            .query_row(
                "SELECT status FROM documents WHERE pk = ?1 AND sk = ?2",
                params![pk, keys::META_SORT_KEY],
                |r| r.get(0),
            )
            .optional()?;

        Ok(match current {
            Some(current) => TransitionOutcome::PreconditionFailed { current },
            None => TransitionOutcome::Missing,
        })
    })
}
