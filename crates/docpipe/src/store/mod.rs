//! Object store abstraction and its backends.

pub mod filesystem;
pub mod memory;

pub use filesystem::FsObjectStore;
pub use memory::MemoryObjectStore;

use crate::document::ObjectLocation;
use crate::error::ObjectStoreError;

/// Blob storage addressed by bucket and key.
///
/// Implementations must make `put` atomic from a reader's point of view:
/// a concurrent `get` sees either the previous object or the new one.
pub trait ObjectStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<ObjectLocation, ObjectStoreError>;

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError>;

    /// Keys in `bucket` starting with `prefix`, in lexical order.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
}

/// Rejects keys that cannot be mapped safely onto a path: empty, absolute,
/// or containing empty, `.` or `..` segments.
pub(crate) fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let invalid = |reason: &str| ObjectStoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.starts_with('/') {
        return Err(invalid("key must be relative"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(invalid("key contains an empty segment")),
            "." | ".." => return Err(invalid("key contains a relative segment")),
            s if s.contains('\0') => return Err(invalid("key contains NUL")),
            _ => {}
        }
    }
    Ok(())
}

pub(crate) fn validate_bucket(bucket: &str) -> Result<(), ObjectStoreError> {
    let ok = !bucket.is_empty()
        && bucket != "."
        && bucket != ".."
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ObjectStoreError::InvalidBucket(bucket.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(validate_key("documents/abc/original/a.pdf").is_ok());
        assert!(validate_key("documents/abc/original/my file.pdf").is_ok());
    }

    #[test]
    fn test_invalid_keys() {
        for key in ["", "/etc/passwd", "a//b", "a/../b", "./a", "a/"] {
            assert!(
                matches!(validate_key(key), Err(ObjectStoreError::InvalidKey { .. })),
                "expected {:?} to be rejected",
                key
            );
        }
    }

    #[test]
    fn test_bucket_names() {
        assert!(validate_bucket("documents-bucket").is_ok());
        assert!(validate_bucket("").is_err());
        assert!(validate_bucket("..").is_err());
        assert!(validate_bucket("a/b").is_err());
    }
}
