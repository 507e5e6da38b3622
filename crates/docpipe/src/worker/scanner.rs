use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use walkdir::WalkDir;

use crate::document::keys;
use crate::error::WorkerError;
use crate::worker::job::IngestJob;

/// Turns files appearing under `<root>/<bucket>/documents/` into
/// object-created notifications, the way the object store would.
#[derive(Debug, Clone)]
pub struct BucketWatcher {
    bucket: String,
    bucket_root: PathBuf,
}

impl BucketWatcher {
    pub fn new<P: AsRef<Path>>(storage_root: P, bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            bucket_root: storage_root.as_ref().join(bucket),
        }
    }

    pub fn bucket_root(&self) -> &Path {
        &self.bucket_root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.bucket_root.join(keys::DOCUMENTS_PREFIX)
    }

    /// Emits one notification per existing original upload.
    ///
    /// Delivery is at-least-once: uploads that were already ingested
    /// are no-ops for the handler.
    pub fn scan(&self) -> Result<Vec<IngestJob>, WorkerError> {
        let documents_dir = self.documents_dir();
        if !documents_dir.is_dir() {
            debug!("Nothing to scan, {} does not exist", documents_dir.display());
            return Ok(Vec::new());
        }

        let mut jobs = Vec::new();

        for entry in WalkDir::new(&documents_dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| WorkerError::ScanFailed {
                path: documents_dir.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(job) = self.job_for_path(&self.bucket_root, entry.path()) {
                jobs.push(job);
            }
        }

        info!(
            "Scanned {} uploads in {}",
            jobs.len(),
            documents_dir.display()
        );
        Ok(jobs)
    }

    /// Maps a file below `bucket_root` to a notification if it is an
    /// original upload. Hidden files (in-flight temp objects) are ignored.
    fn job_for_path(&self, bucket_root: &Path, path: &Path) -> Option<IngestJob> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') {
            return None;
        }

        let relative = path.strip_prefix(bucket_root).ok()?;
        let segments = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        let key = segments.join("/");

        keys::document_id_from_object_key(&key)?;

        let size = std::fs::metadata(path).ok().map(|m| m.len());
        Some(IngestJob::for_object(&self.bucket, &key, size))
    }

    /// Watches the documents tree until `shutdown` is set, calling
    /// `callback` for each new or changed original upload.
    pub fn watch<F>(
        &self,
        callback: F,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Result<(), WorkerError>
    where
        F: Fn(IngestJob) + Send + 'static,
    {
        let documents_dir = self.documents_dir();
        std::fs::create_dir_all(&documents_dir).map_err(|e| WorkerError::WatchDirectory {
            path: documents_dir.clone(),
            source: e,
        })?;
        // Event paths are reported under the watched path, so both sides of
        // the prefix match use the canonical form.
        let bucket_root =
            self.bucket_root
                .canonicalize()
                .map_err(|e| WorkerError::WatchDirectory {
                    path: self.bucket_root.clone(),
                    source: e,
                })?;
        let watched = bucket_root.join(keys::DOCUMENTS_PREFIX);

        // PollWatcher works on network and container filesystems alike.
        let poll_config = NotifyConfig::default().with_poll_interval(poll_interval);

        let debouncer_config = DebouncerConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&watched, RecursiveMode::Recursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching bucket directory: {}", watched.display());

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Bucket watcher shutting down...");
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let path = &event.path;
                        if !path.is_file() {
                            continue;
                        }
                        if let Some(job) = self.job_for_path(&bucket_root, path) {
                            info!("New upload detected: {}", job.describe());
                            callback(job);
                        }
                    }
                }
                Ok(Err(errors)) => {
                    warn!("Watch error: {:?}", errors);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watch channel disconnected");
                    break;
                }
            }
        }

        Ok(())
    }
}
