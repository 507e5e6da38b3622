pub mod change_feed;
pub mod job;
pub mod pool;
pub mod scanner;
pub mod service;

pub use change_feed::ChangeFeedPoller;
pub use job::{IngestJob, JobResult};
pub use pool::WorkerPool;
pub use scanner::BucketWatcher;
pub use service::{DrainReport, Service};

// Re-export crossbeam_channel for use in main
pub use crossbeam_channel;
