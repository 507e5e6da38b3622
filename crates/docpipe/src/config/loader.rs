use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub const ENV_BUCKET: &str = "DOCUMENTS_BUCKET_NAME";
pub const ENV_DATABASE_PATH: &str = "DOCPIPE_DATABASE_PATH";
pub const ENV_STORAGE_ROOT: &str = "DOCPIPE_STORAGE_ROOT";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the file if one is given (defaults otherwise), then applies
/// environment overrides and validates the result.
pub fn resolve_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Overrides file values with non-empty environment variables.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(bucket) = env_value(ENV_BUCKET) {
        config.storage.bucket = bucket;
    }
    if let Some(path) = env_value(ENV_DATABASE_PATH) {
        config.database_path = Some(path);
    }
    if let Some(root) = env_value(ENV_STORAGE_ROOT) {
        config.storage.root = root;
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if crate::store::validate_bucket(&config.storage.bucket).is_err() {
        return Err(ConfigError::Validation {
            message: format!("Invalid bucket name: '{}'", config.storage.bucket),
        });
    }

    if config.storage.root.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "storage.root must not be empty".to_string(),
        });
    }

    if config.workers.count == 0 {
        return Err(ConfigError::Validation {
            message: "workers.count must be at least 1".to_string(),
        });
    }

    if config.workers.max_deliveries == 0 || config.workers.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "workers.max_deliveries and workers.batch_size must be at least 1"
                .to_string(),
        });
    }

    if config.timeouts.store_ms == 0 || config.timeouts.object_ms == 0 {
        return Err(ConfigError::Validation {
            message: "timeouts must be greater than zero".to_string(),
        });
    }

    Ok(())
}
