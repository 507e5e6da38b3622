use std::time::Duration;

use crate::config::Config;

/// Settings shared by the ingest and processing handlers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bucket that holds uploads and derived artifacts.
    pub bucket: String,
    pub store_timeout: Duration,
    pub object_timeout: Duration,
    /// Make the UPLOADED transition conditional on REGISTERED.
    pub guard_upload_transition: bool,
}

impl PipelineConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            store_timeout: Duration::from_secs(10),
            object_timeout: Duration::from_secs(30),
            guard_upload_transition: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            bucket: config.storage.bucket.clone(),
            store_timeout: Duration::from_millis(config.timeouts.store_ms),
            object_timeout: Duration::from_millis(config.timeouts.object_ms),
            guard_upload_transition: config.ingest.guard_upload_transition,
        }
    }
}
