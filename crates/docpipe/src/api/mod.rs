//! Registration and retrieval endpoints as plain JSON request handlers.
//!
//! The handlers are transport-agnostic: callers (the CLI, or any HTTP
//! front end) build an [`ApiRequest`] and relay the [`ApiResponse`].

mod register;
mod retrieve;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::Database;

pub use register::RegisterResponse;

/// A request routed to the document endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    /// Raw JSON body, if any.
    #[serde(default)]
    pub body: Option<String>,
    /// `{document_id}` path parameter.
    #[serde(default)]
    pub document_id: Option<String>,
}

impl ApiRequest {
    pub fn register(body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            body: Some(body.into()),
            document_id: None,
        }
    }

    pub fn get(document_id: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            body: None,
            document_id: Some(document_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: serde_json::Value) -> Self {
        Self { status_code, body }
    }

    pub fn error(status_code: u16, message: &str) -> Self {
        Self::new(status_code, json!({ "error": message }))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Document endpoints bound to a record store and the upload bucket.
#[derive(Clone)]
pub struct DocumentApi {
    db: Database,
    bucket: String,
}

impl DocumentApi {
    pub fn new(db: Database, bucket: impl Into<String>) -> Self {
        Self {
            db,
            bucket: bucket.into(),
        }
    }

    /// Routes `POST` to registration and `GET` to retrieval.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        match request.method.to_ascii_uppercase().as_str() {
            "POST" => register::register_document(&self.db, &self.bucket, request.body.as_deref()),
            "GET" => retrieve::get_document(&self.db, request.document_id.as_deref()),
            _ => ApiResponse::error(405, "Method not allowed"),
        }
    }
}
