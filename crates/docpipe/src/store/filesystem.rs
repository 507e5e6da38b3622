use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{validate_bucket, validate_key, ObjectStore};
use crate::document::ObjectLocation;
use crate::error::ObjectStoreError;

/// Object store backed by a directory tree: `<root>/<bucket>/<key>`.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_path(&self, bucket: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_bucket(bucket)?;
        Ok(self.root.join(bucket))
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.bucket_path(bucket)?.join(key))
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), ObjectStoreError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| ObjectStoreError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Writes `body` to a hidden sibling temp file, then renames it over
    /// `path`. Rename is atomic within one filesystem.
    fn write_atomic(&self, path: &Path, body: &[u8]) -> Result<(), ObjectStoreError> {
        let dir = path.parent().unwrap_or(&self.root);
        self.ensure_directory(dir)?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("object");
        let temp_path = dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()));

        let write_err = |source| ObjectStoreError::Write {
            path: temp_path.clone(),
            source,
        };

        let result = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .and_then(|mut file| {
                file.write_all(body)?;
                file.sync_all()
            })
            .map_err(write_err)
            .and_then(|_| {
                std::fs::rename(&temp_path, path).map_err(|e| ObjectStoreError::Write {
                    path: path.to_path_buf(),
                    source: e,
                })
            });

        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.object_path(bucket, key)?;
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ObjectStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                ObjectStoreError::Read { path, source: e }
            }
        })
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<ObjectLocation, ObjectStoreError> {
        let path = self.object_path(bucket, key)?;
        self.write_atomic(&path, body)?;
        log::debug!("Stored object {}/{} ({} bytes)", bucket, key, body.len());
        Ok(ObjectLocation::new(bucket, key))
    }

    fn exists(&self, bucket: &str, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let bucket_root = self.bucket_path(bucket)?;
        if !bucket_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&bucket_root).follow_links(false) {
            let entry = entry.map_err(|e| ObjectStoreError::Read {
                path: bucket_root.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&bucket_root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
