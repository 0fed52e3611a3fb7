//! Async job queue: priority scheduling, worker pool, timeouts, retries,
//! progress streams, and webhook delivery.

pub mod queue;
pub mod types;
pub mod webhook;

pub use queue::{JobHandler, JobQueue, ProgressHandle};
pub use types::{Job, JobEvent, JobOptions, JobStatus, WebhookPayload};
