use crate::document::keys;
use crate::events::{ObjectCreatedEvent, ObjectCreatedRecord};
use crate::pipeline::IngestSummary;

/// One delivery of an object-created notification to the ingest workers.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub id: String,
    pub event: ObjectCreatedEvent,
    /// 1 for the first delivery, incremented on every redelivery.
    pub attempt: u32,
}

impl IngestJob {
    pub fn new(event: ObjectCreatedEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            attempt: 1,
        }
    }

    /// Builds the notification the object store would emit for a newly
    /// created object. `key` is the plain key; it is encoded here.
    pub fn for_object(bucket: &str, key: &str, size: Option<u64>) -> Self {
        Self::new(ObjectCreatedEvent::single(ObjectCreatedRecord::new(
            bucket,
            &keys::encode_notification_key(key),
            size,
        )))
    }

    /// The same notification, delivered again.
    pub fn redeliver(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }

    /// First key in the notification, for log lines.
    pub fn describe(&self) -> &str {
        self.event
            .records
            .first()
            .and_then(|r| r.raw_key())
            .unwrap_or("<no key>")
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub job: IngestJob,
    pub outcome: Result<IngestSummary, String>,
}

impl JobResult {
    pub fn success(job: IngestJob, summary: IngestSummary) -> Self {
        Self {
            job,
            outcome: Ok(summary),
        }
    }

    pub fn failure(job: IngestJob, error: String) -> Self {
        Self {
            job,
            outcome: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
