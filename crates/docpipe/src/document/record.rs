use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::keys;
use super::status::DocumentStatus;
use super::RECORD_VERSION;

/// A bucket/key pair in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// The single authoritative metadata record of a document (`META#v1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub pk: String,
    pub sk: String,
    pub document_id: String,
    pub filename: String,
    pub bucket: String,
    pub s3_key: String,
    pub status: DocumentStatus,
    /// Reserved for optimistic concurrency; always 1 for now.
    pub version: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_output_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_output_key: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentRecord {
    /// Builds a freshly registered record. The upload key is derived from
    /// the identity and filename.
    pub fn registered(document_id: &str, filename: &str, bucket: &str, created_at: &str) -> Self {
        Self {
            pk: keys::partition_key(document_id),
            sk: keys::META_SORT_KEY.to_string(),
            document_id: document_id.to_string(),
            filename: filename.to_string(),
            bucket: bucket.to_string(),
            s3_key: keys::original_key(document_id, filename),
            status: DocumentStatus::Registered,
            version: RECORD_VERSION,
            page_count: None,
            text_preview: None,
            processed_at: None,
            processing_version: None,
            processed_output_bucket: None,
            processed_output_key: None,
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    pub fn original_location(&self) -> ObjectLocation {
        ObjectLocation::new(&self.bucket, &self.s3_key)
    }

    pub fn processed_output(&self) -> Option<ObjectLocation> {
        match (&self.processed_output_bucket, &self.processed_output_key) {
            (Some(bucket), Some(key)) => Some(ObjectLocation::new(bucket, key)),
            _ => None,
        }
    }
}

/// Kind of event recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    DocumentRegistered,
    DocumentUploaded,
    DocumentProcessed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::DocumentRegistered => "DOCUMENT_REGISTERED",
            AuditEventType::DocumentUploaded => "DOCUMENT_UPLOADED",
            AuditEventType::DocumentProcessed => "DOCUMENT_PROCESSED",
        }
    }

    /// The event that records arrival at `status`.
    pub fn for_status(status: DocumentStatus) -> Self {
        match status {
            DocumentStatus::Registered => AuditEventType::DocumentRegistered,
            DocumentStatus::Uploaded => AuditEventType::DocumentUploaded,
            DocumentStatus::Processed => AuditEventType::DocumentProcessed,
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown audit event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for AuditEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOCUMENT_REGISTERED" => Ok(AuditEventType::DocumentRegistered),
            "DOCUMENT_UPLOADED" => Ok(AuditEventType::DocumentUploaded),
            "DOCUMENT_PROCESSED" => Ok(AuditEventType::DocumentProcessed),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// Immutable, timestamped audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub pk: String,
    pub sk: String,
    pub document_id: String,
    pub event_type: AuditEventType,
    pub timestamp: String,
    /// Snapshot of the fields relevant to this event.
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        document_id: &str,
        event_type: AuditEventType,
        timestamp: &str,
        details: serde_json::Value,
    ) -> Self {
        Self {
            pk: keys::partition_key(document_id),
            sk: keys::audit_sort_key(timestamp),
            document_id: document_id.to_string(),
            event_type,
            timestamp: timestamp.to_string(),
            details,
        }
    }

    pub fn registered(record: &DocumentRecord) -> Self {
        Self::new(
            &record.document_id,
            AuditEventType::DocumentRegistered,
            &record.created_at,
            json!({
                "filename": record.filename,
                "bucket": record.bucket,
                "s3_key": record.s3_key,
            }),
        )
    }

    pub fn uploaded(
        document_id: &str,
        timestamp: &str,
        source: &ObjectLocation,
        page_count: u32,
    ) -> Self {
        Self::new(
            document_id,
            AuditEventType::DocumentUploaded,
            timestamp,
            json!({
                "bucket": source.bucket,
                "s3_key": source.key,
                "page_count": page_count,
            }),
        )
    }

    pub fn processed(
        document_id: &str,
        timestamp: &str,
        processing_version: u32,
        output: &ObjectLocation,
    ) -> Self {
        Self::new(
            document_id,
            AuditEventType::DocumentProcessed,
            timestamp,
            json!({
                "processing_version": processing_version,
                "output_bucket": output.bucket,
                "output_key": output.key,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_record_derives_keys() {
        let record = DocumentRecord::registered("abc", "a.pdf", "docs", "2026-01-01T00:00:00Z");
        assert_eq!(record.pk, "DOC#abc");
        assert_eq!(record.sk, "META#v1");
        assert_eq!(record.s3_key, "documents/abc/original/a.pdf");
        assert_eq!(record.status, DocumentStatus::Registered);
        assert_eq!(record.version, 1);
        assert_eq!(record.created_at, record.updated_at);
        assert!(record.processed_output().is_none());
        assert_eq!(
            record.original_location(),
            ObjectLocation::new("docs", "documents/abc/original/a.pdf")
        );
    }

    #[test]
    fn test_record_serialization_omits_unset_fields() {
        let record = DocumentRecord::registered("abc", "a.pdf", "docs", "2026-01-01T00:00:00Z");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "REGISTERED");
        assert!(value.get("page_count").is_none());
        assert!(value.get("processed_output_key").is_none());
    }

    #[test]
    fn test_audit_entry_keys_and_details() {
        let output = ObjectLocation::new("docs", "documents/abc/processed/summary.json");
        let entry = AuditEntry::processed("abc", "2026-01-01T00:00:01.000001Z", 1, &output);

        assert_eq!(entry.pk, "DOC#abc");
        assert_eq!(entry.sk, "AUDIT#2026-01-01T00:00:01.000001Z");
        assert_eq!(entry.event_type, AuditEventType::DocumentProcessed);
        assert_eq!(entry.details["processing_version"], 1);
        assert_eq!(entry.details["output_key"], "documents/abc/processed/summary.json");
    }

    #[test]
    fn test_registered_audit_snapshots_record() {
        let record = DocumentRecord::registered("abc", "a.pdf", "docs", "2026-01-01T00:00:00Z");
        let entry = AuditEntry::registered(&record);
        assert_eq!(entry.timestamp, record.created_at);
        assert_eq!(entry.details["filename"], "a.pdf");
        assert_eq!(entry.details["s3_key"], "documents/abc/original/a.pdf");
    }

    #[test]
    fn test_event_type_round_trip_names() {
        assert_eq!(
            "DOCUMENT_UPLOADED".parse::<AuditEventType>().unwrap(),
            AuditEventType::DocumentUploaded
        );
        assert!("DOCUMENT_DELETED".parse::<AuditEventType>().is_err());
        assert_eq!(
            AuditEventType::for_status(DocumentStatus::Processed),
            AuditEventType::DocumentProcessed
        );
    }
}
