use serde::{Deserialize, Serialize};

use crate::document::DocumentStatus;
use crate::events::RecordImage;

/// Derived summary written to `documents/<id>/processed/summary.json`.
///
/// Source fields missing from the change image are written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedArtifact {
    pub document_id: String,
    pub status: DocumentStatus,
    pub processed_at: String,
    pub filename: Option<String>,
    pub bucket: Option<String>,
    pub s3_key: Option<String>,
    pub page_count: Option<u32>,
    pub text_preview: Option<String>,
    pub processing_version: u32,
}

impl ProcessedArtifact {
    pub fn from_image(
        document_id: &str,
        image: &RecordImage,
        processed_at: &str,
        processing_version: u32,
    ) -> Self {
        Self {
            document_id: document_id.to_string(),
            status: DocumentStatus::Processed,
            processed_at: processed_at.to_string(),
            filename: image.filename.clone(),
            bucket: image.bucket.clone(),
            s3_key: image.s3_key.clone(),
            page_count: image.page_count,
            text_preview: image.text_preview.clone(),
            processing_version,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_shape() {
        let image = RecordImage {
            filename: Some("a.pdf".to_string()),
            bucket: Some("docs".to_string()),
            s3_key: Some("documents/abc/original/a.pdf".to_string()),
            page_count: Some(1),
            text_preview: Some("hello".to_string()),
            ..Default::default()
        };
        let artifact = ProcessedArtifact::from_image("abc", &image, "2026-01-01T00:00:00Z", 1);
        let value: serde_json::Value =
            serde_json::from_slice(&artifact.to_json().unwrap()).unwrap();

        assert_eq!(value["document_id"], "abc");
        assert_eq!(value["status"], "PROCESSED");
        assert_eq!(value["processed_at"], "2026-01-01T00:00:00Z");
        assert_eq!(value["page_count"], 1);
        assert_eq!(value["processing_version"], 1);
        assert_eq!(value.as_object().unwrap().len(), 9);
    }

    #[test]
    fn test_missing_fields_are_null() {
        let artifact =
            ProcessedArtifact::from_image("abc", &RecordImage::default(), "2026-01-01T00:00:00Z", 1);
        let value = serde_json::to_value(&artifact).unwrap();
        assert!(value["filename"].is_null());
        assert!(value["page_count"].is_null());
        assert!(value["text_preview"].is_null());
    }
}
