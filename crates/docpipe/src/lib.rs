pub mod api;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod events;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod worker;

pub use api::{ApiRequest, ApiResponse, DocumentApi};
pub use config::{load_config, resolve_config, Config};
pub use db::{Database, DatabaseError};
pub use document::{AuditEntry, AuditEventType, DocumentRecord, DocumentStatus};
pub use error::{ConfigError, DocpipeError, ExtractError, ObjectStoreError, Result, WorkerError};
pub use pipeline::{ChangeProcessor, IngestWatcher, PipelineConfig, PipelineContext};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use worker::{Service, WorkerPool};
