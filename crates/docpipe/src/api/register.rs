use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::db::{document_repo, Database};
use crate::document::{self, DocumentRecord, DocumentStatus};

/// Body of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub document_id: String,
    pub bucket: String,
    pub s3_key: String,
    pub status: DocumentStatus,
    pub created_at: String,
}

/// Checks a display filename. It becomes the last segment of the upload
/// key, so it must be a single non-empty path segment.
fn validate_filename(value: Option<&serde_json::Value>) -> Result<&str, &'static str> {
    let filename = match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.as_str(),
        _ => return Err("filename is required and must be a string"),
    };
    if filename.contains('/') || filename.contains('\0') || filename == "." || filename == ".." {
        return Err("filename must be a plain file name");
    }
    Ok(filename)
}

pub(super) fn register_document(db: &Database, bucket: &str, body: Option<&str>) -> ApiResponse {
    let raw = body.filter(|b| !b.trim().is_empty()).unwrap_or("{}");
    let body: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return ApiResponse::error(400, "Request body must be valid JSON"),
    };

    let filename = match validate_filename(body.get("filename")) {
        Ok(filename) => filename,
        Err(message) => return ApiResponse::error(400, message),
    };

    let document_id = document::new_document_id();
    let created_at = document::now_iso();
    let record = DocumentRecord::registered(&document_id, filename, bucket, &created_at);

    if let Err(e) = document_repo::register(db, &record) {
        tracing::error!(
            event_type = "REGISTER_ERROR",
            document_id = %document_id,
            error = %e,
            "Failed to register document"
        );
        return ApiResponse::error(500, "Internal server error");
    }

    tracing::info!(
        event_type = "DOCUMENT_REGISTERED",
        document_id = %record.document_id,
        bucket = %record.bucket,
        key = %record.s3_key,
        timestamp = %record.created_at,
        "Document registered"
    );

    let response = RegisterResponse {
        document_id: record.document_id,
        bucket: record.bucket,
        s3_key: record.s3_key,
        status: record.status,
        created_at: record.created_at,
    };
    match serde_json::to_value(&response) {
        Ok(body) => ApiResponse::new(201, body),
        Err(_) => ApiResponse::error(500, "Internal server error"),
    }
}
