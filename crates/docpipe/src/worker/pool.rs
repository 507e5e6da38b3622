use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::{IngestWatcher, PipelineContext};
use crate::worker::job::{IngestJob, JobResult};

/// Fixed set of threads running the ingest handler.
///
/// Results are returned on an unbounded channel so a worker never blocks
/// on a caller that is busy submitting.
pub struct WorkerPool {
    job_sender: Sender<IngestJob>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(ctx: PipelineContext, worker_count: usize) -> Result<Self, WorkerError> {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = bounded::<IngestJob>(worker_count * 2);
        let (result_sender, result_receiver) = unbounded::<JobResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let watcher = IngestWatcher::new(ctx.clone());

            let handle = thread::Builder::new()
                .name(format!("ingest-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, result_tx, shutdown_flag, watcher);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} ingest workers", worker_count);

        Ok(Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn submit(&self, job: IngestJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<JobResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    /// Result channel, for use in `crossbeam_channel::select!`.
    pub fn results(&self) -> &Receiver<JobResult> {
        &self.result_receiver
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Dropping the sender lets idle workers exit.
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<IngestJob>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    watcher: IngestWatcher,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(job) => {
                debug!(
                    "Worker {} handling {} (attempt {})",
                    worker_id,
                    job.describe(),
                    job.attempt
                );

                let result = match watcher.handle(&job.event) {
                    Ok(summary) => JobResult::success(job, summary),
                    Err(e) => JobResult::failure(job, e.to_string()),
                };

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{document_repo, Database};
    use crate::document::{self, keys, DocumentRecord, DocumentStatus};
    use crate::extract::fixtures::pdf_with_pages;
    use crate::pipeline::PipelineConfig;
    use crate::store::{MemoryObjectStore, ObjectStore};

    fn context() -> (Database, Arc<MemoryObjectStore>, PipelineContext) {
        let db = Database::open_in_memory().unwrap();
        let objects = Arc::new(MemoryObjectStore::new());
        let ctx = PipelineContext::new(db.clone(), objects.clone(), PipelineConfig::new("docs"));
        (db, objects, ctx)
    }

    #[test]
    fn test_worker_pool_creation() {
        let (_, _, ctx) = context();
        let pool = WorkerPool::new(ctx, 2).unwrap();

        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());
        assert!(pool
            .submit(IngestJob::for_object("docs", "documents/a/original/a.pdf", None))
            .is_err());

        pool.wait();
    }

    #[test]
    fn test_submit_and_ingest_upload() {
        let (db, objects, ctx) = context();
        let record = DocumentRecord::registered("abc", "a.pdf", "docs", &document::now_iso());
        document_repo::register(&db, &record).unwrap();
        objects
            .put("docs", &record.s3_key, &pdf_with_pages(&["hello"]))
            .unwrap();

        let pool = WorkerPool::new(ctx, 2).unwrap();
        pool.submit(IngestJob::for_object("docs", &record.s3_key, None))
            .unwrap();

        let result = pool.recv_result().unwrap();
        assert!(result.is_success(), "Job failed: {:?}", result.outcome);
        assert_eq!(result.outcome.unwrap().uploaded, 1);
        assert_eq!(
            document_repo::find(&db, "abc").unwrap().unwrap().status,
            DocumentStatus::Uploaded
        );

        pool.shutdown();
        pool.wait();
    }

    #[test]
    fn test_failed_job_is_reported() {
        let (db, _, ctx) = context();
        let record = DocumentRecord::registered("abc", "a.pdf", "docs", &document::now_iso());
        document_repo::register(&db, &record).unwrap();

        let pool = WorkerPool::new(ctx, 1).unwrap();
        pool.submit(IngestJob::for_object(
            "docs",
            &keys::original_key("abc", "a.pdf"),
            None,
        ))
        .unwrap();

        let result = pool.recv_result().unwrap();
        assert!(!result.is_success());
        assert_eq!(result.job.attempt, 1);

        pool.shutdown();
        pool.wait();
    }
}
