//! Change feed over the record store.
//!
//! Triggers append a row to `record_changes` for every insert or update of
//! a metadata record and every audit append. Consumers read in sequence
//! order and persist how far they got in `stream_checkpoints`. Rows every
//! consumer has acknowledged are pruned when a checkpoint advances.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::document::now_iso;
use crate::events::{ChangeNotification, RecordImage, RecordKeys};

/// A change notification together with its position in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChange {
    pub seq: i64,
    pub notification: ChangeNotification,
}

/// Reads up to `limit` changes with a sequence number above `after`.
///
/// An image that cannot be parsed is passed on as `None` so the consumer
/// can skip it instead of stalling the feed.
pub fn read_after(db: &Database, after: i64, limit: u32) -> Result<Vec<StoredChange>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT seq, event_name, pk, sk, new_image FROM record_changes
             WHERE seq > ?1 ORDER BY seq LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![after, limit], |row| {
                let seq: i64 = row.get(0)?;
                let image: Option<String> = row.get(4)?;
                let new_image = image.and_then(|raw| {
                    serde_json::from_str::<RecordImage>(&raw)
                        .map_err(|e| log::warn!("Unreadable change image at seq {}: {}", seq, e))
                        .ok()
                });
                Ok(StoredChange {
                    seq,
                    notification: ChangeNotification {
                        event_id: seq.to_string(),
                        event_name: row.get(1)?,
                        keys: RecordKeys {
                            pk: row.get(2)?,
                            sk: row.get(3)?,
                        },
                        new_image,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Highest sequence number ever assigned, 0 when nothing was appended.
/// Survives pruning since `seq` is AUTOINCREMENT.
pub fn latest_seq(db: &Database) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COALESCE(
               (SELECT seq FROM sqlite_sequence WHERE name = 'record_changes'),
               0
             )",
            [],
            |r| r.get(0),
        )?)
    })
}

/// Last acknowledged sequence number for a consumer, 0 if it has none.
pub fn checkpoint(db: &Database, consumer: &str) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        Ok(conn.query_row(
            "SELECT COALESCE(MAX(last_seq), 0) FROM stream_checkpoints WHERE consumer = ?1",
            params![consumer],
            |r| r.get(0),
        )?)
    })
}

/// Advances a consumer's checkpoint. Never moves it backwards.
///
/// In the same transaction, deletes changes at or below the lowest
/// checkpoint across all consumers. Returns the number of rows pruned.
pub fn set_checkpoint(db: &Database, consumer: &str, seq: i64) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO stream_checkpoints (consumer, last_seq, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(consumer) DO UPDATE SET
               last_seq = MAX(last_seq, excluded.last_seq),
               updated_at = excluded.updated_at",
            params![consumer, seq, now_iso()],
        )?;
        let pruned = tx.execute(
            "DELETE FROM record_changes
             WHERE seq <= (SELECT MIN(last_seq) FROM stream_checkpoints)",
            [],
        )?;
        tx.commit()?;
        if pruned > 0 {
            log::debug!("Pruned {} acknowledged changes", pruned);
        }
        Ok(pruned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{audit_repo, document_repo};
    use crate::document::{
        AuditEntry, DocumentRecord, DocumentStatus, ObjectLocation, Transition, TransitionGuard,
    };
    use crate::events::ChangeKind;

    fn register(db: &Database, id: &str) {
        let record = DocumentRecord::registered(id, "a.pdf", "docs", "2026-01-01T00:00:00.000000Z");
        document_repo::register(db, &record).unwrap();
    }

    #[test]
    fn test_register_emits_insert_changes() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "abc");

        let changes = read_after(&db, 0, 100).unwrap();
        assert_eq!(changes.len(), 2);

        let meta = &changes[0].notification;
        assert_eq!(meta.kind(), Some(ChangeKind::Insert));
        let image = meta.new_image.as_ref().unwrap();
        assert!(image.is_metadata());
        assert_eq!(image.status(), Some(DocumentStatus::Registered));
        assert_eq!(image.page_count, None);

        let audit = &changes[1].notification;
        assert!(audit.keys.sk.starts_with("AUDIT#"));
        assert_eq!(
            audit.new_image.as_ref().unwrap().event_type.as_deref(),
            Some("DOCUMENT_REGISTERED")
        );
    }

    #[test]
    fn test_update_emits_modify_with_new_image() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "abc");
        let at = "2026-01-01T00:00:01.000000Z";
        let t = Transition::uploaded(3, "text".to_string(), at);
        let location = ObjectLocation::new("docs", "documents/abc/original/a.pdf");
        let audit = AuditEntry::uploaded("abc", at, &location, 3);
        document_repo::apply_transition(&db, "abc", &t, TransitionGuard::ExpectCurrent, &audit)
            .unwrap();

        // The MODIFY is followed by the audit append from the same transaction.
        let changes = read_after(&db, 2, 100).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].notification.kind(), Some(ChangeKind::Insert));
        let n = &changes[0].notification;
        assert_eq!(n.kind(), Some(ChangeKind::Modify));
        assert_eq!(n.event_id, changes[0].seq.to_string());
        let image = n.new_image.as_ref().unwrap();
        assert_eq!(image.status(), Some(DocumentStatus::Uploaded));
        assert_eq!(image.page_count, Some(3));
        assert_eq!(image.s3_key.as_deref(), Some("documents/abc/original/a.pdf"));
    }

    #[test]
    fn test_failed_guard_emits_nothing() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "abc");
        let before = latest_seq(&db).unwrap();

        let output = ObjectLocation::new("docs", "k");
        let t = Transition::processed(1, output.clone(), "t");
        let audit = AuditEntry::processed("abc", "t", 1, &output);
        document_repo::apply_transition(&db, "abc", &t, TransitionGuard::ExpectCurrent, &audit)
            .unwrap();

        assert_eq!(latest_seq(&db).unwrap(), before);
    }

    #[test]
    fn test_audit_append_emits_change() {
        let db = Database::open_in_memory().unwrap();
        let output = ObjectLocation::new("docs", "documents/abc/processed/summary.json");
        audit_repo::append(&db, &AuditEntry::processed("abc", "t", 1, &output)).unwrap();

        let changes = read_after(&db, 0, 10).unwrap();
        assert_eq!(changes.len(), 1);
        let image = changes[0].notification.new_image.as_ref().unwrap();
        assert!(!image.is_metadata());
        assert_eq!(image.document_id().as_deref(), Some("abc"));
    }

    #[test]
    fn test_read_after_respects_limit_and_order() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "a");
        register(&db, "b");

        let first = read_after(&db, 0, 3).unwrap();
        assert_eq!(first.len(), 3);
        assert!(first.windows(2).all(|w| w[0].seq < w[1].seq));

        let rest = read_after(&db, first[2].seq, 10).unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn test_checkpoint_is_monotonic() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(checkpoint(&db, "c").unwrap(), 0);
        set_checkpoint(&db, "c", 5).unwrap();
        set_checkpoint(&db, "c", 3).unwrap();
        assert_eq!(checkpoint(&db, "c").unwrap(), 5);
        assert_eq!(checkpoint(&db, "other").unwrap(), 0);
    }

    #[test]
    fn test_acknowledged_changes_are_pruned() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "a");
        register(&db, "b");
        let latest = latest_seq(&db).unwrap();
        assert_eq!(latest, 4);

        assert_eq!(set_checkpoint(&db, "c", 2).unwrap(), 2);
        let rest = read_after(&db, 0, 10).unwrap();
        assert_eq!(rest.iter().map(|c| c.seq).collect::<Vec<_>>(), vec![3, 4]);

        set_checkpoint(&db, "c", latest).unwrap();
        assert!(read_after(&db, 0, 10).unwrap().is_empty());
        assert_eq!(latest_seq(&db).unwrap(), latest);

        // Sequence numbers are not reused after the table empties.
        register(&db, "c");
        assert_eq!(read_after(&db, latest, 10).unwrap()[0].seq, latest + 1);
    }

    #[test]
    fn test_lagging_consumer_holds_back_pruning() {
        let db = Database::open_in_memory().unwrap();
        register(&db, "a");
        set_checkpoint(&db, "slow", 0).unwrap();

        assert_eq!(set_checkpoint(&db, "fast", 2).unwrap(), 0);
        assert_eq!(read_after(&db, 0, 10).unwrap().len(), 2);

        assert_eq!(set_checkpoint(&db, "slow", 1).unwrap(), 1);
        assert_eq!(read_after(&db, 0, 10).unwrap().len(), 1);
    }
}
