//! Priority job queue with a worker pool, timeouts, retries, progress
//! streaming, and webhook delivery.
//!
//! Scheduling: a sorted queue ordered by `(priority DESC, createdAt ASC)`
//! maintained with binary-search insertion, drained by a worker tick while
//! slots are free. Retries re-insert with the original `createdAt`, so a
//! retried job keeps its age-order position within its priority band.
//!
//! Every acquired resource (running slot, cancel channel, timeout, progress
//! listeners) is released on all exit paths; a handler future dropped by
//! timeout or cancellation takes its partial work with it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::jobs::types::{Job, JobEvent, JobOptions, JobStatus, WebhookPayload};
use crate::jobs::webhook;

/// Error string recorded when a job is aborted by its timeout.
const ABORT_ERROR: &str = "timed out or aborted";

/// Handler for one job type. The handler must observe `cancel`; the queue
/// additionally drops the handler future on timeout or cancellation.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(
        &self,
        job: Job,
        progress: ProgressHandle,
        cancel: watch::Receiver<bool>,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Handle handlers use to report progress. Updates are clamped to `[0, 100]`
/// and only emitted while the job is still running.
#[derive(Clone)]
pub struct ProgressHandle {
    inner: Arc<Inner>,
    job_id: String,
}

impl ProgressHandle {
    pub async fn update(&self, progress: f64, message: Option<&str>) {
        let clamped = progress.clamp(0.0, 100.0);
        let still_running = {
            let mut jobs = self.inner.jobs.lock().await;
            match jobs.get_mut(&self.job_id) {
                Some(job) if job.status == JobStatus::Running => {
                    job.progress = clamped;
                    job.status_message = message.map(str::to_string);
                    true
                }
                _ => false,
            }
        };
        if still_running {
            self.inner
                .emit(
                    &self.job_id,
                    JobEvent::Progress {
                        job_id: self.job_id.clone(),
                        progress: clamped,
                        message: message.map(str::to_string),
                    },
                )
                .await;
        }
    }
}

/// Queue position entry; kept sorted best-first.
#[derive(Debug, Clone)]
struct QueueSlot {
    id: String,
    priority: u8,
    created_at: DateTime<Utc>,
}

struct Inner {
    jobs: Mutex<HashMap<String, Job>>,
    queue: Mutex<Vec<QueueSlot>>,
    /// Occupied worker slots. A counter, not a set of ids: a retried job
    /// can be re-dispatched while its previous task is still unwinding, and
    /// identity-based tracking would double-count or double-free the slot.
    running: AtomicUsize,
    handlers: Mutex<HashMap<String, Arc<dyn JobHandler>>>,
    listeners: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<JobEvent>>>>,
    cancels: Mutex<HashMap<String, watch::Sender<bool>>>,
    webhook_client: reqwest::Client,
    concurrency: usize,
    worker_tick: Duration,
    default_timeout: Duration,
    terminal_retention: usize,
    shutdown: AtomicBool,
}

impl Inner {
    /// Insert a slot keeping `(priority DESC, createdAt ASC)` order.
    async fn insert_slot(&self, slot: QueueSlot) {
        let mut queue = self.queue.lock().await;
        let index = queue.partition_point(|existing| {
            existing.priority > slot.priority
                || (existing.priority == slot.priority && existing.created_at <= slot.created_at)
        });
        queue.insert(index, slot);
    }

    /// Deliver an event to this job's listeners; a terminal event closes
    /// and unregisters them.
    async fn emit(&self, job_id: &str, event: JobEvent) {
        let terminal = event.is_terminal();
        let mut listeners = self.listeners.lock().await;
        if let Some(senders) = listeners.get_mut(job_id) {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
            if terminal {
                listeners.remove(job_id);
            }
        }
    }

    async fn send_webhook(&self, job: &Job) {
        let Some(url) = job.options.webhook_url.clone() else {
            return;
        };
        let duration_ms = match (job.started_at, job.completed_at) {
            (Some(start), Some(end)) => {
                u64::try_from(end.signed_duration_since(start).num_milliseconds()).ok()
            }
            _ => None,
        };
        let payload = WebhookPayload {
            job_id: job.id.clone(),
            job_type: job.job_type.clone(),
            status: job.status,
            result: job.result.clone(),
            error: job.error.clone(),
            duration_ms,
        };
        webhook::deliver_detached(self.webhook_client.clone(), url, payload);
    }

    /// Drop oldest terminal jobs beyond the retention window.
    async fn evict_terminal(&self) {
        let mut jobs = self.jobs.lock().await;
        let mut terminal: Vec<(String, DateTime<Utc>)> = jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .map(|job| (job.id.clone(), job.completed_at.unwrap_or(job.created_at)))
            .collect();
        if terminal.len() <= self.terminal_retention {
            return;
        }
        terminal.sort_by_key(|(_, completed)| *completed);
        let excess = terminal.len() - self.terminal_retention;
        for (id, _) in terminal.into_iter().take(excess) {
            jobs.remove(&id);
            self.listeners.lock().await.remove(&id);
            self.cancels.lock().await.remove(&id);
            debug!(job_id = %id, "evicted terminal job");
        }
    }
}

/// The job queue. Construct, register handlers, call `start`.
pub struct JobQueue {
    inner: Arc<Inner>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl JobQueue {
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                queue: Mutex::new(Vec::new()),
                running: AtomicUsize::new(0),
                handlers: Mutex::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
                cancels: Mutex::new(HashMap::new()),
                webhook_client: reqwest::Client::new(),
                concurrency: config.job_concurrency(),
                worker_tick: config.worker_tick(),
                default_timeout: config.default_job_timeout(),
                terminal_retention: config.terminal_retention(),
                shutdown: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Register a handler for a job type. Later registrations replace
    /// earlier ones.
    pub async fn register_handler(&self, job_type: &str, handler: Arc<dyn JobHandler>) {
        self.inner
            .handlers
            .lock()
            .await
            .insert(job_type.to_string(), handler);
    }

    /// Start the worker tick. Idempotent.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(async move {
            loop {
                if inner.shutdown.load(Ordering::Relaxed) {
                    break;
                }
                tokio::time::sleep(inner.worker_tick).await;
                dispatch_ready(&inner).await;
            }
        }));
    }

    /// Stop the worker and refuse new dispatches. Running jobs finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    /// Enqueue a job. Returns its id.
    pub async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> String {
        let options = options.sanitized();
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let job = Job {
            id: id.clone(),
            job_type: job_type.to_string(),
            status: JobStatus::Queued,
            payload,
            options: options.clone(),
            progress: 0.0,
            status_message: None,
            result: None,
            error: None,
            created_at,
            started_at: None,
            completed_at: None,
            attempts: 0,
        };
        self.inner.jobs.lock().await.insert(id.clone(), job);
        self.inner
            .insert_slot(QueueSlot {
                id: id.clone(),
                priority: options.priority,
                created_at,
            })
            .await;
        debug!(job_id = %id, job_type, priority = options.priority, "job enqueued");
        id
    }

    /// Snapshot of a job record.
    pub async fn get(&self, id: &str) -> Option<Job> {
        self.inner.jobs.lock().await.get(id).cloned()
    }

    /// Cancel a job. Queued jobs leave the queue; running jobs get their
    /// signal fired and their handler future dropped. Returns `false` when
    /// the job is unknown or already terminal.
    pub async fn cancel(&self, id: &str) -> bool {
        {
            let mut jobs = self.inner.jobs.lock().await;
            let Some(job) = jobs.get_mut(id) else {
                return false;
            };
            if job.status.is_terminal() {
                return false;
            }
            if job.status == JobStatus::Queued {
                let mut queue = self.inner.queue.lock().await;
                queue.retain(|slot| slot.id != id);
            }
            job.status = JobStatus::Cancelled;
            job.completed_at = Some(Utc::now());
        }

        if let Some(signal) = self.inner.cancels.lock().await.get(id) {
            let _ = signal.send(true);
        }

        self.inner
            .emit(
                id,
                JobEvent::Status {
                    job_id: id.to_string(),
                    status: JobStatus::Cancelled,
                    message: None,
                },
            )
            .await;
        self.inner.evict_terminal().await;
        true
    }

    /// Progress stream: an initial status event, then events in arrival
    /// order until a terminal event. For already-terminal jobs the stream
    /// yields exactly one event. `None` for unknown jobs.
    pub async fn stream_progress(&self, id: &str) -> Option<UnboundedReceiverStream<JobEvent>> {
        let job = self.get(id).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        let initial = JobEvent::Status {
            job_id: job.id.clone(),
            status: job.status,
            message: job.status_message.clone(),
        };
        let _ = tx.send(initial);

        if !job.status.is_terminal() {
            self.inner
                .listeners
                .lock()
                .await
                .entry(id.to_string())
                .or_default()
                .push(tx);
        }
        // A terminal job's sender drops here, closing the stream after the
        // single snapshot event.
        Some(UnboundedReceiverStream::new(rx))
    }

    /// Number of jobs waiting in the queue.
    pub async fn queued_len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }
}

/// Fill free worker slots from the queue head.
async fn dispatch_ready(inner: &Arc<Inner>) {
    loop {
        if inner.running.load(Ordering::Acquire) >= inner.concurrency {
            return;
        }
        let slot = {
            let mut queue = inner.queue.lock().await;
            if queue.is_empty() {
                return;
            }
            queue.remove(0)
        };
        inner.running.fetch_add(1, Ordering::AcqRel);
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            execute(&inner, &slot.id).await;
            inner.running.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

enum RunOutcome {
    Finished(anyhow::Result<serde_json::Value>),
    TimedOut,
    Cancelled,
}

async fn execute(inner: &Arc<Inner>, id: &str) {
    // Snapshot the job; a cancel between dequeue and here shows up as a
    // non-queued status.
    let Some(mut job) = inner.jobs.lock().await.get(id).cloned() else {
        return;
    };
    if job.status != JobStatus::Queued {
        return;
    }

    let handler = inner.handlers.lock().await.get(&job.job_type).cloned();
    let Some(handler) = handler else {
        let error = format!("no handler registered for job type '{}'", job.job_type);
        warn!(job_id = %id, %error, "dropping job");
        let job = finalize(inner, id, JobStatus::Failed, None, Some(error.clone())).await;
        inner
            .emit(id, JobEvent::Error { job_id: id.to_string(), error })
            .await;
        if let Some(job) = job {
            inner.send_webhook(&job).await;
        }
        inner.evict_terminal().await;
        return;
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    inner.cancels.lock().await.insert(id.to_string(), cancel_tx);

    {
        let mut jobs = inner.jobs.lock().await;
        if let Some(stored) = jobs.get_mut(id) {
            stored.status = JobStatus::Running;
            stored.started_at = Some(Utc::now());
            stored.attempts += 1;
            job = stored.clone();
        }
    }
    inner
        .emit(
            id,
            JobEvent::Status {
                job_id: id.to_string(),
                status: JobStatus::Running,
                message: None,
            },
        )
        .await;

    let timeout = job
        .options
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(inner.default_timeout);
    let progress = ProgressHandle {
        inner: Arc::clone(inner),
        job_id: id.to_string(),
    };
    let mut cancel_watch = cancel_rx.clone();

    let outcome = tokio::select! {
        result = handler.handle(job.clone(), progress, cancel_rx) => RunOutcome::Finished(result),
        () = tokio::time::sleep(timeout) => RunOutcome::TimedOut,
        _ = cancel_watch.changed() => RunOutcome::Cancelled,
    };

    // The cancel channel belongs to this attempt only; a retry gets a fresh
    // pair, so the entry goes away here rather than in the dispatcher.
    inner.cancels.lock().await.remove(id);

    // A cancel that raced the handler's completion still wins: cancel()
    // already wrote the terminal state and emitted its event.
    let currently_cancelled = inner
        .jobs
        .lock()
        .await
        .get(id)
        .is_some_and(|j| j.status == JobStatus::Cancelled);
    if currently_cancelled || matches!(outcome, RunOutcome::Cancelled) {
        debug!(job_id = %id, "job cancelled");
        return;
    }

    match outcome {
        RunOutcome::Finished(Ok(result)) => {
            let job = finalize(inner, id, JobStatus::Completed, Some(result.clone()), None).await;
            inner
                .emit(
                    id,
                    JobEvent::Complete {
                        job_id: id.to_string(),
                        result: Some(result),
                    },
                )
                .await;
            if let Some(job) = job {
                inner.send_webhook(&job).await;
            }
            inner.evict_terminal().await;
        }
        RunOutcome::Finished(Err(e)) => {
            fail_or_retry(inner, id, job.options.priority, format!("{e:#}")).await;
        }
        RunOutcome::TimedOut => {
            fail_or_retry(inner, id, job.options.priority, ABORT_ERROR.to_string()).await;
        }
        RunOutcome::Cancelled => unreachable!("handled above"),
    }
}

/// Re-queue the job if attempts remain, otherwise mark it failed.
async fn fail_or_retry(inner: &Arc<Inner>, id: &str, priority: u8, error: String) {
    let (attempts, retries) = {
        let jobs = inner.jobs.lock().await;
        let job = jobs.get(id);
        (
            job.map_or(0, |j| j.attempts),
            job.map_or(0, |j| j.options.retries),
        )
    };
    if attempts <= retries {
        debug!(job_id = %id, attempts, retries, "retrying job");
        let created_at = {
            let mut jobs = inner.jobs.lock().await;
            match jobs.get_mut(id) {
                Some(stored) => {
                    stored.status = JobStatus::Queued;
                    stored.started_at = None;
                    stored.progress = 0.0;
                    stored.created_at
                }
                None => return,
            }
        };
        // Retries keep their original createdAt so they stay age-ordered
        // within their priority.
        inner
            .insert_slot(QueueSlot {
                id: id.to_string(),
                priority,
                created_at,
            })
            .await;
    } else {
        warn!(job_id = %id, attempts, %error, "job failed");
        let job = finalize(inner, id, JobStatus::Failed, None, Some(error.clone())).await;
        inner
            .emit(id, JobEvent::Error { job_id: id.to_string(), error })
            .await;
        if let Some(job) = job {
            inner.send_webhook(&job).await;
        }
        inner.evict_terminal().await;
    }
}

/// Write a terminal state into the record and return the updated job.
async fn finalize(
    inner: &Arc<Inner>,
    id: &str,
    status: JobStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
) -> Option<Job> {
    let mut jobs = inner.jobs.lock().await;
    let job = jobs.get_mut(id)?;
    job.status = status;
    job.completed_at = Some(Utc::now());
    if status == JobStatus::Completed {
        job.progress = 100.0;
    }
    job.result = result;
    job.error = error;
    Some(job.clone())
}
