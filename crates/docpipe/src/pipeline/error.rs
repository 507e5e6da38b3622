use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Record store failed: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Object store failed: {0}")]
    ObjectStore(#[from] crate::error::ObjectStoreError),

    #[error("Metadata extraction failed: {0}")]
    Extract(#[from] crate::error::ExtractError),

    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("{operation} aborted before returning a result")]
    Aborted { operation: &'static str },

    #[error("Failed to spawn worker thread: {0}")]
    SpawnFailed(String),

    #[error("Change record '{pk}' carries no document identity")]
    MissingIdentity { pk: String },
}
