//! Change Event Processor: turns UPLOADED metadata changes into a derived
//! artifact and the PROCESSED transition.
//!
//! Deliveries are at-least-once. The conditional PROCESSED update is the
//! fence: a duplicate or concurrent delivery finds the status already
//! advanced and becomes a no-op.

use crate::document::{
    self, keys, AuditEntry, DocumentStatus, Transition, TransitionGuard, TransitionOutcome,
    PROCESSING_VERSION,
};
use crate::events::{ChangeBatch, ChangeKind, ChangeNotification, RecordImage};

use super::artifact::ProcessedArtifact;
use super::context::PipelineContext;
use super::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessSkip {
    /// Change kind other than INSERT or MODIFY.
    UnsupportedChange { event_name: String },
    MissingImage,
    /// The image is not the metadata record (e.g. an audit entry).
    NotMetadata,
    /// New status is not UPLOADED.
    NotUploaded { status: Option<String> },
    /// The record disappeared between the change and the update.
    RecordMissing { document_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed { document_id: String },
    /// The conditional update found the record already past UPLOADED.
    AlreadyHandled {
        document_id: String,
        current: DocumentStatus,
    },
    Skipped(ProcessSkip),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub processed: usize,
    pub already_handled: usize,
    pub skipped: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &ProcessOutcome) {
        match outcome {
            ProcessOutcome::Processed { .. } => self.processed += 1,
            ProcessOutcome::AlreadyHandled { .. } => self.already_handled += 1,
            ProcessOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

pub struct ChangeProcessor {
    ctx: PipelineContext,
}

impl ChangeProcessor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Processes a batch sequentially. Any error aborts the batch and
    /// propagates so the whole batch is redelivered.
    pub fn handle_batch(&self, batch: &ChangeBatch) -> Result<BatchSummary, PipelineError> {
        let mut summary = BatchSummary {
            received: batch.records.len(),
            ..Default::default()
        };

        tracing::info!(
            event_type = "STREAM_BATCH_RECEIVED",
            record_count = summary.received,
            timestamp = %document::now_iso(),
            "Received change batch"
        );

        for notification in &batch.records {
            let outcome = self.handle_notification(notification)?;
            summary.record(&outcome);
        }

        Ok(summary)
    }

    pub fn handle_notification(
        &self,
        notification: &ChangeNotification,
    ) -> Result<ProcessOutcome, PipelineError> {
        let result = self.process(notification);
        if let Err(e) = &result {
            tracing::error!(
                event_type = "PROCESS_ERROR",
                event_id = %notification.event_id,
                pk = %notification.keys.pk,
                timestamp = %document::now_iso(),
                error = %e,
                "Change processing failed"
            );
        }
        result
    }

    fn process(&self, notification: &ChangeNotification) -> Result<ProcessOutcome, PipelineError> {
        match notification.kind() {
            Some(ChangeKind::Insert) | Some(ChangeKind::Modify) => {}
            _ => {
                return Ok(skip(ProcessSkip::UnsupportedChange {
                    event_name: notification.event_name.clone(),
                }))
            }
        }

        let Some(image) = notification.new_image.as_ref() else {
            return Ok(skip(ProcessSkip::MissingImage));
        };
        if !image.is_metadata() {
            return Ok(skip(ProcessSkip::NotMetadata));
        }
        if image.status() != Some(DocumentStatus::Uploaded) {
            return Ok(skip(ProcessSkip::NotUploaded {
                status: image.status.clone(),
            }));
        }

        let document_id = image.document_id().ok_or_else(|| PipelineError::MissingIdentity {
            pk: image
                .pk
                .clone()
                .unwrap_or_else(|| notification.keys.pk.clone()),
        })?;
        let _span = tracing::info_span!("process", document_id = %document_id).entered();

        // Sequential redeliveries stop here, before the artifact is touched.
        let Some(existing) = self.ctx.find_document(&document_id)? else {
            return Ok(skip(ProcessSkip::RecordMissing { document_id }));
        };
        if existing.status != DocumentStatus::Uploaded {
            return Ok(already_handled(document_id, existing.status));
        }

        let processed_at = document::now_iso();
        tracing::info!(
            event_type = "PROCESS_ATTEMPT",
            document_id = %document_id,
            event_id = %notification.event_id,
            timestamp = %processed_at,
            "Processing uploaded document"
        );

        let artifact =
            ProcessedArtifact::from_image(&document_id, image, &processed_at, PROCESSING_VERSION);
        let output = self.ctx.put_object(
            &self.ctx.config.bucket,
            &keys::processed_key(&document_id),
            artifact.to_json()?,
        )?;

        let transition = Transition::processed(PROCESSING_VERSION, output.clone(), &processed_at);
        let audit =
            AuditEntry::processed(&document_id, &processed_at, PROCESSING_VERSION, &output);
        match self.ctx.transition(
            &document_id,
            transition,
            TransitionGuard::ExpectCurrent,
            audit,
        )? {
            TransitionOutcome::Applied => {}
            TransitionOutcome::PreconditionFailed { current } => {
                // A concurrent delivery won the update after our artifact
                // write; put back the artifact matching the stored record.
                self.restore_artifact(&document_id, image)?;
                return Ok(already_handled(document_id, current));
            }
            TransitionOutcome::Missing => {
                return Ok(skip(ProcessSkip::RecordMissing { document_id }));
            }
        }

        tracing::info!(
            event_type = "PROCESS_SUCCESS",
            document_id = %document_id,
            output_bucket = %output.bucket,
            output_key = %output.key,
            timestamp = %processed_at,
            "Document marked PROCESSED"
        );

        Ok(ProcessOutcome::Processed { document_id })
    }

    /// Rewrites the artifact from the stored record's processing stamp so
    /// it agrees with the record that won the conditional update.
    fn restore_artifact(&self, document_id: &str, image: &RecordImage) -> Result<(), PipelineError> {
        let Some(record) = self.ctx.find_document(document_id)? else {
            return Ok(());
        };
        let (Some(processed_at), Some(version), Some(output)) = (
            record.processed_at.as_deref(),
            record.processing_version,
            record.processed_output(),
        ) else {
            return Ok(());
        };

        let artifact = ProcessedArtifact::from_image(document_id, image, processed_at, version);
        self.ctx
            .put_object(&output.bucket, &output.key, artifact.to_json()?)?;
        Ok(())
    }
}

fn already_handled(document_id: String, current: DocumentStatus) -> ProcessOutcome {
    tracing::info!(
        event_type = "PROCESS_SKIP_ALREADY_HANDLED",
        document_id = %document_id,
        current_status = %current,
        "Record already advanced past UPLOADED"
    );
    ProcessOutcome::AlreadyHandled {
        document_id,
        current,
    }
}

fn skip(reason: ProcessSkip) -> ProcessOutcome {
    tracing::debug!(event_type = "PROCESS_SKIP", reason = ?reason, "Skipping change");
    ProcessOutcome::Skipped(reason)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::{audit_repo, document_repo, Database};
    use crate::document::{AuditEventType, DocumentRecord};
    use crate::events::RecordKeys;
    use crate::pipeline::PipelineConfig;
    use crate::store::{MemoryObjectStore, ObjectStore};

    struct Fixture {
        db: Database,
        objects: Arc<MemoryObjectStore>,
        processor: ChangeProcessor,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let objects = Arc::new(MemoryObjectStore::new());
        let ctx = PipelineContext::new(db.clone(), objects.clone(), PipelineConfig::new("docs"));
        Fixture {
            db,
            objects,
            processor: ChangeProcessor::new(ctx),
        }
    }

    fn uploaded_record(db: &Database, id: &str) -> DocumentRecord {
        let record = DocumentRecord::registered(id, "a.pdf", "docs", &document::now_iso());
        document_repo::register(db, &record).unwrap();
        let now = document::now_iso();
        let t = Transition::uploaded(1, "hello".to_string(), &now);
        let audit = AuditEntry::uploaded(id, &now, &record.original_location(), 1);
        document_repo::apply_transition(db, id, &t, TransitionGuard::ExpectCurrent, &audit)
            .unwrap();
        document_repo::find(db, id).unwrap().unwrap()
    }

    fn modify(record: &DocumentRecord) -> ChangeNotification {
        ChangeNotification {
            event_id: "1".to_string(),
            event_name: "MODIFY".to_string(),
            keys: RecordKeys {
                pk: record.pk.clone(),
                sk: record.sk.clone(),
            },
            new_image: Some(RecordImage {
                pk: Some(record.pk.clone()),
                sk: Some(record.sk.clone()),
                document_id: Some(record.document_id.clone()),
                status: Some(record.status.as_str().to_string()),
                filename: Some(record.filename.clone()),
                bucket: Some(record.bucket.clone()),
                s3_key: Some(record.s3_key.clone()),
                page_count: record.page_count,
                text_preview: record.text_preview.clone(),
                event_type: None,
            }),
        }
    }

    #[test]
    fn test_uploaded_change_is_processed() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");

        let outcome = f.processor.handle_notification(&modify(&record)).unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Processed {
                document_id: "abc".to_string()
            }
        );

        let stored = document_repo::find(&f.db, "abc").unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Processed);
        assert_eq!(stored.processing_version, Some(PROCESSING_VERSION));
        assert_eq!(
            stored.processed_output_key.as_deref(),
            Some("documents/abc/processed/summary.json")
        );

        let body = f
            .objects
            .get("docs", "documents/abc/processed/summary.json")
            .unwrap();
        let artifact: ProcessedArtifact = serde_json::from_slice(&body).unwrap();
        assert_eq!(artifact.page_count, Some(1));
        assert_eq!(artifact.s3_key.as_deref(), Some("documents/abc/original/a.pdf"));
        assert_eq!(artifact.processed_at, stored.processed_at.unwrap());
    }

    #[test]
    fn test_duplicate_delivery_audits_once() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");
        let n = modify(&record);

        f.processor.handle_notification(&n).unwrap();
        let second = f.processor.handle_notification(&n).unwrap();
        assert_eq!(
            second,
            ProcessOutcome::AlreadyHandled {
                document_id: "abc".to_string(),
                current: DocumentStatus::Processed
            }
        );

        assert_eq!(
            audit_repo::count_for_document(&f.db, "abc", Some(AuditEventType::DocumentProcessed))
                .unwrap(),
            1
        );
        assert_eq!(
            document_repo::find(&f.db, "abc").unwrap().unwrap().status,
            DocumentStatus::Processed
        );
    }

    #[test]
    fn test_duplicate_delivery_keeps_artifact_in_sync() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");
        let n = modify(&record);

        f.processor.handle_notification(&n).unwrap();
        f.processor.handle_notification(&n).unwrap();

        assert_eq!(f.objects.put_count(), 1);
        let stored = document_repo::find(&f.db, "abc").unwrap().unwrap();
        let body = f
            .objects
            .get("docs", "documents/abc/processed/summary.json")
            .unwrap();
        let artifact: ProcessedArtifact = serde_json::from_slice(&body).unwrap();
        assert_eq!(Some(artifact.processed_at), stored.processed_at);
    }

    #[test]
    fn test_restore_artifact_matches_stored_record() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");
        let n = modify(&record);
        f.processor.handle_notification(&n).unwrap();

        // Artifact left behind by a delivery that lost the update.
        let image = n.new_image.as_ref().unwrap();
        let stale = ProcessedArtifact::from_image("abc", image, "2000-01-01T00:00:00.000000Z", 1);
        f.objects
            .put(
                "docs",
                "documents/abc/processed/summary.json",
                &stale.to_json().unwrap(),
            )
            .unwrap();

        f.processor.restore_artifact("abc", image).unwrap();

        let stored = document_repo::find(&f.db, "abc").unwrap().unwrap();
        let body = f
            .objects
            .get("docs", "documents/abc/processed/summary.json")
            .unwrap();
        let artifact: ProcessedArtifact = serde_json::from_slice(&body).unwrap();
        assert_eq!(Some(artifact.processed_at), stored.processed_at);
        assert_eq!(artifact.page_count, Some(1));
    }

    #[test]
    fn test_non_uploaded_status_writes_nothing() {
        let f = fixture();
        let mut record = uploaded_record(&f.db, "abc");
        for status in [DocumentStatus::Registered, DocumentStatus::Processed] {
            record.status = status;
            let outcome = f.processor.handle_notification(&modify(&record)).unwrap();
            assert!(matches!(
                outcome,
                ProcessOutcome::Skipped(ProcessSkip::NotUploaded { .. })
            ));
        }
        assert_eq!(f.objects.put_count(), 0);
        assert_eq!(
            document_repo::find(&f.db, "abc").unwrap().unwrap().status,
            DocumentStatus::Uploaded
        );
    }

    #[test]
    fn test_audit_record_change_is_skipped() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");
        let mut n = modify(&record);
        n.event_name = "INSERT".to_string();
        if let Some(image) = n.new_image.as_mut() {
            image.sk = Some("AUDIT#2026-01-01T00:00:00.000000Z".to_string());
            image.event_type = Some("DOCUMENT_UPLOADED".to_string());
        }

        let outcome = f.processor.handle_notification(&n).unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped(ProcessSkip::NotMetadata));
        assert_eq!(f.objects.put_count(), 0);
    }

    #[test]
    fn test_remove_and_missing_image_are_skipped() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");

        let mut remove = modify(&record);
        remove.event_name = "REMOVE".to_string();
        assert!(matches!(
            f.processor.handle_notification(&remove).unwrap(),
            ProcessOutcome::Skipped(ProcessSkip::UnsupportedChange { .. })
        ));

        let mut no_image = modify(&record);
        no_image.new_image = None;
        assert_eq!(
            f.processor.handle_notification(&no_image).unwrap(),
            ProcessOutcome::Skipped(ProcessSkip::MissingImage)
        );
        assert_eq!(f.objects.put_count(), 0);
    }

    #[test]
    fn test_identity_falls_back_to_partition_key() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");
        let mut n = modify(&record);
        if let Some(image) = n.new_image.as_mut() {
            image.document_id = None;
        }

        let outcome = f.processor.handle_notification(&n).unwrap();
        assert_eq!(
            outcome,
            ProcessOutcome::Processed {
                document_id: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_missing_identity_is_error() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");
        let mut n = modify(&record);
        if let Some(image) = n.new_image.as_mut() {
            image.document_id = None;
            image.pk = None;
        }
        n.keys.pk = String::new();

        let err = f.processor.handle_notification(&n).unwrap_err();
        assert!(matches!(err, PipelineError::MissingIdentity { .. }));
    }

    #[test]
    fn test_missing_optional_fields_are_tolerated() {
        let f = fixture();
        let record = uploaded_record(&f.db, "abc");
        let mut n = modify(&record);
        if let Some(image) = n.new_image.as_mut() {
            image.page_count = None;
            image.text_preview = None;
            image.filename = None;
        }

        f.processor.handle_notification(&n).unwrap();
        let body = f
            .objects
            .get("docs", "documents/abc/processed/summary.json")
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value["page_count"].is_null());
        assert!(value["filename"].is_null());
    }

    #[test]
    fn test_batch_summary_and_failure_propagation() {
        let f = fixture();
        let a = uploaded_record(&f.db, "a");
        let b = uploaded_record(&f.db, "b");

        let mut broken = modify(&b);
        if let Some(image) = broken.new_image.as_mut() {
            image.document_id = None;
            image.pk = Some("BROKEN".to_string());
        }

        let ok_batch = ChangeBatch {
            records: vec![modify(&a), modify(&a)],
        };
        let summary = f.processor.handle_batch(&ok_batch).unwrap();
        assert_eq!(summary.received, 2);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.already_handled, 1);

        let bad_batch = ChangeBatch {
            records: vec![modify(&a), broken],
        };
        assert!(f.processor.handle_batch(&bad_batch).is_err());
    }
}
