use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{validate_bucket, validate_key, ObjectStore};
use crate::document::ObjectLocation;
use crate::error::ObjectStoreError;

/// In-process object store, mainly for tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let objects = self.objects.lock().map_err(|_| ObjectStoreError::LockPoisoned)?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<ObjectLocation, ObjectStoreError> {
        validate_bucket(bucket)?;
        validate_key(key)?;
        let mut objects = self.objects.lock().map_err(|_| ObjectStoreError::LockPoisoned)?;
        objects.insert((bucket.to_string(), key.to_string()), body.to_vec());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(ObjectLocation::new(bucket, key))
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError> {
        let objects = self.objects.lock().map_err(|_| ObjectStoreError::LockPoisoned)?;
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let objects = self.objects.lock().map_err(|_| ObjectStoreError::LockPoisoned)?;
        Ok(objects
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}
