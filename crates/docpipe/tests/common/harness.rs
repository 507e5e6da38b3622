//! Test harness for isolated test execution.
//!
//! The `TestHarness` owns a temporary directory holding the object store
//! root and a file-backed record store, plus the API and service wired to
//! them the same way the binary does.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use docpipe::api::{ApiRequest, ApiResponse, DocumentApi};
use docpipe::config::WorkersConfig;
use docpipe::db::{audit_repo, Database};
use docpipe::document::{AuditEntry, AuditEventType};
use docpipe::pipeline::{PipelineConfig, PipelineContext};
use docpipe::store::{FsObjectStore, ObjectStore};
use docpipe::worker::{DrainReport, Service};

pub const BUCKET: &str = "documents";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub objects: Arc<FsObjectStore>,
    pub api: DocumentApi,
    pub service: Service,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::new(BUCKET))
    }

    /// Harness with the upload transition left unconditional.
    pub fn unguarded() -> Self {
        let mut config = PipelineConfig::new(BUCKET);
        config.guard_upload_transition = false;
        Self::with_config(config)
    }

    fn with_config(config: PipelineConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage_root = temp_dir.path().join("objects");
        let db = Database::open(&temp_dir.path().join("docpipe.db"), Duration::from_secs(5))
            .expect("Failed to open database");
        let objects = Arc::new(FsObjectStore::new(&storage_root));
        let ctx = PipelineContext::new(db.clone(), objects.clone(), config);
        let workers = WorkersConfig {
            count: 2,
            max_deliveries: 3,
            batch_size: 25,
            poll_interval_ms: 20,
        };

        Self {
            api: DocumentApi::new(db.clone(), BUCKET),
            service: Service::new(ctx, &storage_root, workers),
            temp_dir,
            db,
            objects,
        }
    }

    pub fn register(&self, filename: &str) -> ApiResponse {
        let body = json!({ "filename": filename }).to_string();
        self.api.handle(&ApiRequest::register(body))
    }

    /// Registers `filename` and returns the new document id.
    pub fn register_ok(&self, filename: &str) -> String {
        let response = self.register(filename);
        assert_eq!(response.status_code, 201, "Registration failed: {}", response.body);
        response.body["document_id"]
            .as_str()
            .expect("document_id missing")
            .to_string()
    }

    pub fn get(&self, document_id: &str) -> ApiResponse {
        self.api.handle(&ApiRequest::get(document_id))
    }

    /// The `document` object from a successful retrieval.
    pub fn document(&self, document_id: &str) -> Value {
        let response = self.get(document_id);
        assert_eq!(response.status_code, 200, "Retrieval failed: {}", response.body);
        response.body["document"].clone()
    }

    /// Uploads `body` to the key returned at registration.
    pub fn upload(&self, document_id: &str, body: &[u8]) {
        let document = self.document(document_id);
        let key = document["s3_key"].as_str().expect("s3_key missing");
        self.objects
            .put(BUCKET, key, body)
            .expect("Failed to upload object");
    }

    pub fn drain(&self) -> DrainReport {
        self.service.drain_once().expect("Drain failed")
    }

    pub fn audit(&self, document_id: &str) -> Vec<AuditEntry> {
        audit_repo::list_for_document(&self.db, document_id).expect("Failed to list audit")
    }

    pub fn audit_count(&self, document_id: &str, event_type: AuditEventType) -> u64 {
        audit_repo::count_for_document(&self.db, document_id, Some(event_type))
            .expect("Failed to count audit")
    }

    pub fn summary(&self, document_id: &str) -> Value {
        let key = format!("documents/{}/processed/summary.json", document_id);
        let bytes = self.objects.get(BUCKET, &key).expect("summary.json missing");
        serde_json::from_slice(&bytes).expect("summary.json is not JSON")
    }
}
