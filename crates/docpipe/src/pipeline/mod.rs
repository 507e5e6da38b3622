//! Lifecycle handlers: the Object Ingest Watcher (REGISTERED -> UPLOADED)
//! and the Change Event Processor (UPLOADED -> PROCESSED).

pub mod artifact;
pub mod bounded;
pub mod config;
pub mod context;
pub mod error;
pub mod ingest;
pub mod processor;

pub use artifact::ProcessedArtifact;
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::PipelineError;
pub use ingest::{IngestOutcome, IngestSkip, IngestSummary, IngestWatcher};
pub use processor::{BatchSummary, ChangeProcessor, ProcessOutcome, ProcessSkip};
