use serde::{Deserialize, Serialize};

/// An object-created notification batch.
///
/// Keys are carried percent-encoded with spaces as `+`, the way the
/// object store emits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<ObjectCreatedRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCreatedRecord {
    #[serde(default)]
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    #[serde(default)]
    pub bucket: BucketEntity,
    #[serde(default)]
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ObjectCreatedRecord {
    /// Builds a record. `encoded_key` must already be in notification
    /// encoding.
    pub fn new(bucket: &str, encoded_key: &str, size: Option<u64>) -> Self {
        Self {
            s3: S3Entity {
                bucket: BucketEntity {
                    name: Some(bucket.to_string()),
                },
                object: ObjectEntity {
                    key: Some(encoded_key.to_string()),
                    size,
                },
            },
        }
    }

    pub fn bucket(&self) -> Option<&str> {
        self.s3.bucket.name.as_deref().filter(|b| !b.is_empty())
    }

    /// The key as carried in the notification, still encoded.
    pub fn raw_key(&self) -> Option<&str> {
        self.s3.object.key.as_deref().filter(|k| !k.is_empty())
    }
}

impl ObjectCreatedEvent {
    pub fn single(record: ObjectCreatedRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn from_records(records: Vec<ObjectCreatedRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
