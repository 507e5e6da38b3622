use serde_json::json;

use super::ApiResponse;
use crate::db::{document_repo, Database};

pub(super) fn get_document(db: &Database, document_id: Option<&str>) -> ApiResponse {
    let Some(document_id) = document_id.filter(|id| !id.is_empty()) else {
        return ApiResponse::error(400, "document_id path parameter is required");
    };

    match document_repo::find(db, document_id) {
        Ok(Some(record)) => match serde_json::to_value(&record) {
            Ok(document) => ApiResponse::new(200, json!({ "document": document })),
            Err(_) => ApiResponse::error(500, "Internal server error"),
        },
        Ok(None) => ApiResponse::new(
            404,
            json!({ "error": "Document not found", "document_id": document_id }),
        ),
        Err(e) => {
            tracing::error!(
                event_type = "GET_DOCUMENT_ERROR",
                document_id,
                error = %e,
                "Failed to read document"
            );
            ApiResponse::error(500, "Internal server error")
        }
    }
}
