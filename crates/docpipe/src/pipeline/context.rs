use std::sync::Arc;

use crate::db::{document_repo, Database};
use crate::document::{
    AuditEntry, DocumentRecord, ObjectLocation, Transition, TransitionGuard, TransitionOutcome,
};
use crate::store::ObjectStore;

use super::bounded::run_bounded;
use super::config::PipelineConfig;
use super::error::PipelineError;

/// Handles injected into both handlers. Every call to a collaborator goes
/// through a bounded wait.
#[derive(Clone)]
pub struct PipelineContext {
    pub db: Database,
    pub objects: Arc<dyn ObjectStore>,
    pub config: Arc<PipelineConfig>,
}

impl PipelineContext {
    pub fn new(db: Database, objects: Arc<dyn ObjectStore>, config: PipelineConfig) -> Self {
        Self {
            db,
            objects,
            config: Arc::new(config),
        }
    }

    pub fn fetch_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, PipelineError> {
        let objects = Arc::clone(&self.objects);
        let (bucket, key) = (bucket.to_string(), key.to_string());
        run_bounded("object get", self.config.object_timeout, move || {
            Ok(objects.get(&bucket, &key)?)
        })
    }

    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<ObjectLocation, PipelineError> {
        let objects = Arc::clone(&self.objects);
        let (bucket, key) = (bucket.to_string(), key.to_string());
        run_bounded("object put", self.config.object_timeout, move || {
            Ok(objects.put(&bucket, &key, &body)?)
        })
    }

    pub fn find_document(&self, document_id: &str) -> Result<Option<DocumentRecord>, PipelineError> {
        let db = self.db.clone();
        let document_id = document_id.to_string();
        run_bounded("record read", self.config.store_timeout, move || {
            Ok(document_repo::find(&db, &document_id)?)
        })
    }

    /// Applies a transition together with its audit entry. Both commit or
    /// neither does.
    pub fn transition(
        &self,
        document_id: &str,
        transition: Transition,
        guard: TransitionGuard,
        audit: AuditEntry,
    ) -> Result<TransitionOutcome, PipelineError> {
        let db = self.db.clone();
        let document_id = document_id.to_string();
        run_bounded("record update", self.config.store_timeout, move || {
            Ok(document_repo::apply_transition(
                &db,
                &document_id,
                &transition,
                guard,
                &audit,
            )?)
        })
    }
}
