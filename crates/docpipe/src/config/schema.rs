use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    /// Record store location. Defaults to `~/.docpipe/data/docpipe.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            database_path: None,
            storage: StorageConfig::default(),
            workers: WorkersConfig::default(),
            timeouts: TimeoutsConfig::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// The configured database path, or the per-user default.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per bucket.
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_storage_root() -> String {
    "./data/objects".to_string()
}

fn default_bucket() -> String {
    "documents".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            bucket: default_bucket(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Attempts per upload notification before it is dropped.
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,
    /// Change notifications per processor batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_max_deliveries() -> u32 {
    3
}

fn default_batch_size() -> u32 {
    100
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            max_deliveries: default_max_deliveries(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_store_ms")]
    pub store_ms: u64,
    #[serde(default = "default_object_ms")]
    pub object_ms: u64,
}

fn default_store_ms() -> u64 {
    10_000
}

fn default_object_ms() -> u64 {
    30_000
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            store_ms: default_store_ms(),
            object_ms: default_object_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Only move to UPLOADED from REGISTERED. `false` overwrites
    /// unconditionally.
    #[serde(default = "default_true")]
    pub guard_upload_transition: bool,
}

fn default_true() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            guard_upload_transition: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Text,
        }
    }
}
