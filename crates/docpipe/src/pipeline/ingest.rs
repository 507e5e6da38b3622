//! Object Ingest Watcher: reacts to object-created notifications for
//! original uploads and advances the document to UPLOADED.

use crate::document::{self, keys, AuditEntry, DocumentStatus, ObjectLocation, Transition};
use crate::document::{TransitionGuard, TransitionOutcome};
use crate::events::{ObjectCreatedEvent, ObjectCreatedRecord};
use crate::extract;

use super::context::PipelineContext;
use super::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSkip {
    /// The notification carried no bucket or no key.
    MissingLocation,
    /// The key is not `documents/<id>/original/<filename>`.
    NotADocument { key: String },
    /// No metadata record exists for the identity in the key.
    Unregistered { document_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Uploaded {
        document_id: String,
        page_count: u32,
    },
    /// The record had already left REGISTERED. Nothing was written.
    AlreadyHandled {
        document_id: String,
        current: DocumentStatus,
    },
    Skipped(IngestSkip),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub uploaded: usize,
    pub already_handled: usize,
    pub skipped: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Uploaded { .. } => self.uploaded += 1,
            IngestOutcome::AlreadyHandled { .. } => self.already_handled += 1,
            IngestOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

pub struct IngestWatcher {
    ctx: PipelineContext,
}

impl IngestWatcher {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Handles every record of a notification in order. The first failure
    /// aborts the rest and propagates, so the whole notification can be
    /// redelivered.
    pub fn handle(&self, event: &ObjectCreatedEvent) -> Result<IngestSummary, PipelineError> {
        let mut summary = IngestSummary::default();

        if event.is_empty() {
            tracing::info!(event_type = "NO_RECORDS", "Notification contained no records");
            return Ok(summary);
        }

        for record in &event.records {
            let outcome = self.handle_record(record)?;
            summary.record(&outcome);
        }

        Ok(summary)
    }

    pub fn handle_record(&self, record: &ObjectCreatedRecord) -> Result<IngestOutcome, PipelineError> {
        let (Some(bucket), Some(raw_key)) = (record.bucket(), record.raw_key()) else {
            tracing::warn!(
                event_type = "UPLOAD_SKIP_MISSING_LOCATION",
                "Notification record has no bucket or key"
            );
            return Ok(IngestOutcome::Skipped(IngestSkip::MissingLocation));
        };

        let Some(key) = keys::decode_notification_key(raw_key) else {
            return Ok(skip_not_document(bucket, raw_key));
        };
        let Some(document_id) = keys::document_id_from_object_key(&key) else {
            return Ok(skip_not_document(bucket, &key));
        };

        let result = self.ingest(bucket, &key, document_id);
        if let Err(e) = &result {
            tracing::error!(
                event_type = "UPLOAD_ERROR",
                document_id,
                bucket,
                key = %key,
                timestamp = %document::now_iso(),
                error = %e,
                "Upload handling failed"
            );
        }
        result
    }

    fn ingest(
        &self,
        bucket: &str,
        key: &str,
        document_id: &str,
    ) -> Result<IngestOutcome, PipelineError> {
        let _span = tracing::info_span!("ingest", document_id).entered();
        let guarded = self.ctx.config.guard_upload_transition;

        tracing::info!(
            event_type = "UPLOAD_ATTEMPT",
            document_id,
            bucket,
            key,
            timestamp = %document::now_iso(),
            "Handling uploaded object"
        );

        let Some(existing) = self.ctx.find_document(document_id)? else {
            return Ok(skip_unregistered(document_id, key));
        };

        if existing.status != DocumentStatus::Registered {
            if guarded {
                return Ok(already_handled(document_id, existing.status));
            }
            tracing::warn!(
                event_type = "UPLOAD_OVERWRITE",
                document_id,
                current_status = %existing.status,
                "Overwriting record that already left REGISTERED"
            );
        }

        let body = self.ctx.fetch_object(bucket, key)?;
        let summary = extract::extract_metadata(&body)?;

        let now = document::now_iso();
        let transition = Transition::uploaded(summary.page_count, summary.text_preview, &now);
        let guard = if guarded {
            TransitionGuard::ExpectCurrent
        } else {
            TransitionGuard::Unconditional
        };

        let source = ObjectLocation::new(bucket, key);
        let audit = AuditEntry::uploaded(document_id, &now, &source, summary.page_count);

        match self.ctx.transition(document_id, transition, guard, audit)? {
            TransitionOutcome::Applied => {}
            TransitionOutcome::PreconditionFailed { current } => {
                return Ok(already_handled(document_id, current));
            }
            TransitionOutcome::Missing => return Ok(skip_unregistered(document_id, key)),
        }

        tracing::info!(
            event_type = "UPLOAD_SUCCESS",
            document_id,
            bucket,
            key,
            page_count = summary.page_count,
            timestamp = %now,
            "Document marked UPLOADED"
        );

        Ok(IngestOutcome::Uploaded {
            document_id: document_id.to_string(),
            page_count: summary.page_count,
        })
    }
}

fn skip_not_document(bucket: &str, key: &str) -> IngestOutcome {
    tracing::info!(
        event_type = "UPLOAD_SKIP_NOT_DOCUMENT",
        bucket,
        key,
        "Key is not a document upload"
    );
    IngestOutcome::Skipped(IngestSkip::NotADocument {
        key: key.to_string(),
    })
}

fn skip_unregistered(document_id: &str, key: &str) -> IngestOutcome {
    tracing::warn!(
        event_type = "UPLOAD_SKIP_UNREGISTERED",
        document_id,
        key,
        "No metadata record for uploaded object"
    );
    IngestOutcome::Skipped(IngestSkip::Unregistered {
        document_id: document_id.to_string(),
    })
}

fn already_handled(document_id: &str, current: DocumentStatus) -> IngestOutcome {
    tracing::info!(
        event_type = "UPLOAD_SKIP_ALREADY_HANDLED",
        document_id,
        current_status = %current,
        "Record already advanced past REGISTERED"
    );
    IngestOutcome::AlreadyHandled {
        document_id: document_id.to_string(),
        current,
    }
}
