use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::db::{change_repo, Database};
use crate::events::ChangeBatch;
use crate::pipeline::{BatchSummary, ChangeProcessor, PipelineContext, PipelineError};

pub const PROCESSOR_CONSUMER: &str = "change-processor";

/// Delivers the record store's change feed to the processor in batches.
///
/// The checkpoint only advances after a batch succeeds, so a failed batch
/// is delivered again on the next poll.
pub struct ChangeFeedPoller {
    db: Database,
    processor: ChangeProcessor,
    consumer: String,
    batch_size: u32,
}

impl ChangeFeedPoller {
    pub fn new(ctx: PipelineContext, batch_size: u32) -> Self {
        Self {
            db: ctx.db.clone(),
            processor: ChangeProcessor::new(ctx),
            consumer: PROCESSOR_CONSUMER.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    /// Delivers at most one batch. Returns the number of notifications
    /// consumed, 0 when the feed is caught up.
    pub fn poll_once(&self) -> Result<usize, PipelineError> {
        let after = change_repo::checkpoint(&self.db, &self.consumer)?;
        let changes = change_repo::read_after(&self.db, after, self.batch_size)?;

        let Some(last_seq) = changes.last().map(|c| c.seq) else {
            return Ok(0);
        };

        let batch = ChangeBatch {
            records: changes.into_iter().map(|c| c.notification).collect(),
        };
        let summary: BatchSummary = self.processor.handle_batch(&batch)?;

        change_repo::set_checkpoint(&self.db, &self.consumer, last_seq)?;
        debug!(
            "Change batch up to seq {}: {} processed, {} already handled, {} skipped",
            last_seq, summary.processed, summary.already_handled, summary.skipped
        );

        Ok(summary.received)
    }

    /// Polls until the feed is caught up, including the changes the
    /// processor itself appends.
    pub fn drain(&self) -> Result<usize, PipelineError> {
        let mut total = 0;
        loop {
            let consumed = self.poll_once()?;
            if consumed == 0 {
                return Ok(total);
            }
            total += consumed;
        }
    }

    /// Polls every `interval` until `shutdown` is set. Failed batches are
    /// logged and retried on the next tick.
    pub fn run(&self, shutdown: Arc<AtomicBool>, interval: Duration) {
        info!("Change feed poller started (consumer {})", self.consumer);

        while !shutdown.load(Ordering::Relaxed) {
            match self.drain() {
                Ok(0) => {}
                Ok(n) => debug!("Consumed {} change notifications", n),
                Err(e) => warn!("Change batch failed, will redeliver: {}", e),
            }
            std::thread::sleep(interval);
        }

        info!("Change feed poller stopped");
    }
}
