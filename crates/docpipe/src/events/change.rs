use serde::{Deserialize, Deserializer, Serialize};

use crate::document::keys;
use crate::document::DocumentStatus;

/// Kind of change carried by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Modify => "MODIFY",
            ChangeKind::Remove => "REMOVE",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "INSERT" => Some(ChangeKind::Insert),
            "MODIFY" => Some(ChangeKind::Modify),
            "REMOVE" => Some(ChangeKind::Remove),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordKeys {
    #[serde(default)]
    pub pk: String,
    #[serde(default)]
    pub sk: String,
}

/// A single change notification from the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    #[serde(default)]
    pub event_id: String,
    /// `INSERT`, `MODIFY` or `REMOVE`. Kept as text so unknown kinds
    /// still parse and can be skipped.
    pub event_name: String,
    #[serde(default)]
    pub keys: RecordKeys,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<RecordImage>,
}

impl ChangeNotification {
    pub fn kind(&self) -> Option<ChangeKind> {
        ChangeKind::parse(&self.event_name)
    }
}

/// A batch of change notifications, delivered together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<ChangeNotification>,
}

/// Post-change image of a record.
///
/// Fields are parsed leniently: a missing or malformed value becomes
/// `None` instead of failing the whole notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordImage {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub pk: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub sk: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub s3_key: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text_preview: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

impl RecordImage {
    /// True when the image is the metadata record (`META#v1`) rather
    /// than an audit entry.
    pub fn is_metadata(&self) -> bool {
        self.sk.as_deref() == Some(keys::META_SORT_KEY)
    }

    pub fn status(&self) -> Option<DocumentStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// The document identity, falling back to the `DOC#<id>` partition
    /// key when the image carries no `document_id`.
    pub fn document_id(&self) -> Option<String> {
        if let Some(id) = self.document_id.as_deref().filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        self.pk
            .as_deref()
            .and_then(keys::document_id_from_partition_key)
            .map(str::to_string)
    }
}
