//! Long-running service wiring the bucket watcher, the ingest worker pool
//! and the change feed poller together.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{never, select, unbounded};
use log::{debug, error, info, warn};

use crate::config::WorkersConfig;
use crate::error::{DocpipeError, WorkerError};
use crate::pipeline::{IngestSummary, IngestWatcher, PipelineContext};
use crate::worker::change_feed::ChangeFeedPoller;
use crate::worker::job::{IngestJob, JobResult};
use crate::worker::pool::WorkerPool;
use crate::worker::scanner::BucketWatcher;

/// Counts from a synchronous [`Service::drain_once`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub notifications: usize,
    pub ingest: IngestSummary,
    /// Notifications dropped after exhausting their deliveries.
    pub failed: usize,
    pub changes: usize,
}

pub struct Service {
    ctx: PipelineContext,
    watcher: BucketWatcher,
    workers: WorkersConfig,
}

impl Service {
    pub fn new<P: AsRef<Path>>(ctx: PipelineContext, storage_root: P, workers: WorkersConfig) -> Self {
        let watcher = BucketWatcher::new(storage_root, &ctx.config.bucket);
        Self {
            ctx,
            watcher,
            workers,
        }
    }

    pub fn watcher(&self) -> &BucketWatcher {
        &self.watcher
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.workers.poll_interval_ms)
    }

    /// Runs until `shutdown` is set.
    pub fn run(&self, shutdown: Arc<AtomicBool>) -> Result<(), DocpipeError> {
        let pool = WorkerPool::new(self.ctx.clone(), self.workers.count)?;

        info!("Performing initial scan of {}", self.watcher.bucket_root().display());
        let initial = self.watcher.scan()?;
        info!("Initial scan found {} uploads", initial.len());
        for job in initial {
            pool.submit(job)?;
        }

        let (upload_tx, upload_rx) = unbounded::<IngestJob>();
        let idle = never::<IngestJob>();
        let mut watcher_alive = true;

        let watcher = self.watcher.clone();
        let watcher_shutdown = Arc::clone(&shutdown);
        let interval = self.poll_interval();
        let watcher_handle = thread::Builder::new()
            .name("bucket-watcher".to_string())
            .spawn(move || {
                let callback = move |job: IngestJob| {
                    if upload_tx.send(job).is_err() {
                        debug!("Upload channel closed, dropping notification");
                    }
                };
                if let Err(e) = watcher.watch(callback, watcher_shutdown, interval) {
                    error!("Bucket watcher stopped: {}", e);
                }
            })
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        let poller = ChangeFeedPoller::new(self.ctx.clone(), self.workers.batch_size);
        let poller_shutdown = Arc::clone(&shutdown);
        let poller_handle = thread::Builder::new()
            .name("change-feed".to_string())
            .spawn(move || poller.run(poller_shutdown, interval))
            .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

        while !shutdown.load(Ordering::Relaxed) {
            let uploads = if watcher_alive { &upload_rx } else { &idle };
            select! {
                recv(uploads) -> job => match job {
                    Ok(job) => {
                        if let Err(e) = pool.submit(job) {
                            error!("Failed to submit job: {}", e);
                        }
                    }
                    // Watcher gone; keep serving results and the change feed.
                    Err(_) => watcher_alive = false,
                },
                recv(pool.results()) -> result => {
                    if let Ok(result) = result {
                        self.settle(&pool, result);
                    }
                }
                default(Duration::from_millis(100)) => {}
            }
        }

        info!("Shutting down service...");
        pool.shutdown();
        pool.wait();

        for (name, handle) in [("bucket watcher", watcher_handle), ("change feed", poller_handle)] {
            if handle.join().is_err() {
                error!("{} thread panicked", name);
            }
        }

        info!("Service stopped");
        Ok(())
    }

    /// Logs a finished job and redelivers it while deliveries remain.
    fn settle(&self, pool: &WorkerPool, result: JobResult) {
        match result.outcome {
            Ok(summary) => {
                debug!(
                    "Job {} done: {} uploaded, {} already handled, {} skipped",
                    result.job.describe(),
                    summary.uploaded,
                    summary.already_handled,
                    summary.skipped
                );
            }
            Err(e) if result.job.attempt < self.workers.max_deliveries => {
                warn!(
                    "Job {} failed on attempt {}, redelivering: {}",
                    result.job.describe(),
                    result.job.attempt,
                    e
                );
                if let Err(e) = pool.submit(result.job.redeliver()) {
                    error!("Failed to redeliver job: {}", e);
                }
            }
            Err(e) => {
                error!(
                    "Job {} failed after {} deliveries, dropping: {}",
                    result.job.describe(),
                    result.job.attempt,
                    e
                );
            }
        }
    }

    /// Delivers every existing upload once (with redelivery on failure)
    /// and then drains the change feed, all on the calling thread.
    pub fn drain_once(&self) -> Result<DrainReport, DocpipeError> {
        let ingest = IngestWatcher::new(self.ctx.clone());
        let mut report = DrainReport::default();

        for mut job in self.watcher.scan()? {
            report.notifications += 1;
            loop {
                match ingest.handle(&job.event) {
                    Ok(summary) => {
                        report.ingest.uploaded += summary.uploaded;
                        report.ingest.already_handled += summary.already_handled;
                        report.ingest.skipped += summary.skipped;
                        break;
                    }
                    Err(e) if job.attempt < self.workers.max_deliveries => {
                        warn!("Job {} failed, redelivering: {}", job.describe(), e);
                        job = job.redeliver();
                    }
                    Err(e) => {
                        error!("Job {} failed, dropping: {}", job.describe(), e);
                        report.failed += 1;
                        break;
                    }
                }
            }
        }

        let poller = ChangeFeedPoller::new(self.ctx.clone(), self.workers.batch_size);
        report.changes = poller.drain()?;

        info!(
            "Drained {} notifications and {} changes",
            report.notifications, report.changes
        );
        Ok(report)
    }
}
