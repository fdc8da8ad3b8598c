//! Bounded Async Job Queue
//!
//! Every call to the external generation API goes through [`JobQueue::submit`].
//! The queue enforces three limits at once:
//!
//! - a concurrency cap: at most `max_concurrent` jobs hold a dispatch slot;
//!   waiting jobs are admitted in FIFO order
//! - a rolling-window cap: at most `max_per_window` external calls (retries
//!   included) start within any `window`
//! - a wall-clock budget per dispatched job, covering its retries and backoff
//!
//! A task that fails with an error the retry predicate accepts is retried
//! with exponential backoff while it keeps its slot. Any other error is
//! returned to the submitter straight away.
//!
//! ```text
//! submit ─► Queued ─► (slot + window) ─► Dispatched ─► Succeeded
//!                                          │   ▲    └─► Failed
//!                                          ▼   │
//!                                       RetryWaiting
//! ```

pub mod jobs;
pub mod window;

pub use jobs::{Job, JobSnapshot, JobState};
pub use window::DispatchWindow;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::QueueConfig;
use crate::llm::GenerationError;
use crate::utils::retry::{with_retry, Backoff, RetryError};

/// One attempt at the external call, producing the raw model text.
pub type TaskFuture = BoxFuture<'static, Result<String, GenerationError>>;

/// Decides which task errors are worth retrying.
pub type RetryPredicate = Arc<dyn Fn(&GenerationError) -> bool + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job {job_id} was still rate limited after {attempts} attempts")]
    RateLimitExhausted { job_id: String, attempts: u32 },

    #[error("job {job_id} exceeded its {}ms time budget", .timeout.as_millis())]
    TaskTimeout { job_id: String, timeout: Duration },

    #[error(transparent)]
    Task(GenerationError),

    #[error("queue closed before job {job_id} was dispatched")]
    Closed { job_id: String },
}

/// Counters reported by the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
}

#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: QueueConfig,
    slots: Semaphore,
    window: DispatchWindow,
    jobs: Mutex<HashMap<u64, Job>>,
    next_seq: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    is_retryable: RetryPredicate,
}

impl QueueInner {
    fn with_job<T>(&self, seq: u64, f: impl FnOnce(&mut Job) -> T) -> Option<T> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get_mut(&seq).map(f)
    }

    fn advance(&self, seq: u64, next: JobState) {
        self.with_job(seq, |job| job.advance(next));
    }

    /// Moves the job to a terminal state and forgets it.
    fn finish(&self, seq: u64, outcome: JobState, error: Option<String>) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut job) = jobs.remove(&seq) {
            if let Some(error) = error {
                job.record_error(error);
            }
            job.advance(outcome);
        }
        match outcome {
            JobState::Succeeded => self.completed.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Live-table entry for one submission. Dropping it without [`JobEntry::finish`]
/// means the submitter went away, and the job is recorded as failed.
struct JobEntry<'a> {
    inner: &'a QueueInner,
    seq: u64,
    job_id: String,
    finished: bool,
}

impl<'a> JobEntry<'a> {
    fn register(inner: &'a QueueInner, job_id: &str) -> Self {
        let seq = inner.next_seq.fetch_add(1, Ordering::Relaxed);
        inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(seq, Job::new(job_id.to_string(), inner.config.max_attempts));
        Self {
            inner,
            seq,
            job_id: job_id.to_string(),
            finished: false,
        }
    }

    fn finish(mut self, outcome: JobState, error: Option<String>) {
        self.finished = true;
        self.inner.finish(self.seq, outcome, error);
    }
}

impl Drop for JobEntry<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(job_id = %self.job_id, "Submitter dropped the job before it finished");
            self.inner
                .finish(self.seq, JobState::Failed, Some("abandoned".to_string()));
        }
    }
}

impl JobQueue {
    /// Queue that retries only rate-limit errors.
    pub fn new(config: QueueConfig) -> Self {
        Self::with_retry_predicate(config, GenerationError::is_rate_limited)
    }

    pub fn with_retry_predicate<P>(config: QueueConfig, is_retryable: P) -> Self
    where
        P: Fn(&GenerationError) -> bool + Send + Sync + 'static,
    {
        info!(
            max_concurrent = config.max_concurrent,
            max_per_window = config.max_per_window,
            window_ms = config.window.as_millis() as u64,
            job_timeout_ms = config.job_timeout.as_millis() as u64,
            "Generation queue configured"
        );

        Self {
            inner: Arc::new(QueueInner {
                config,
                slots: Semaphore::new(config.max_concurrent.max(1)),
                window: DispatchWindow::new(config.window, config.max_per_window),
                jobs: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                retries: AtomicU64::new(0),
                is_retryable: Arc::new(is_retryable),
            }),
        }
    }

    /// Runs `task` under the queue's limits and resolves with its raw text.
    ///
    /// `task` is called once per attempt and must return a fresh future each time.
    /// Completion order is not submission order; callers correlate by `job_id`.
    pub async fn submit<F>(&self, job_id: impl Into<String>, task: F) -> Result<String, QueueError>
    where
        F: FnMut() -> TaskFuture + Send,
    {
        let job_id = job_id.into();
        let inner = &self.inner;
        let config = inner.config;

        let entry = JobEntry::register(inner, &job_id);
        let seq = entry.seq;
        info!(job_id = %job_id, "Adding task to queue");

        let _permit = match inner.slots.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                warn!(job_id = %job_id, "Queue closed before dispatch");
                entry.finish(JobState::Failed, Some("queue closed".to_string()));
                return Err(QueueError::Closed { job_id });
            }
        };

        inner.window.acquire().await;
        inner.advance(seq, JobState::Dispatched { attempt: 1 });
        info!(job_id = %job_id, "Starting task");

        let attempts = {
            let inner = Arc::clone(inner);
            let mut task = task;
            move |attempt: u32| {
                let inner = Arc::clone(&inner);
                let call = task();
                async move {
                    if attempt > 1 {
                        inner.window.acquire().await;
                        inner.advance(seq, JobState::Dispatched { attempt });
                    }
                    call.await
                }
            }
        };

        let on_retry = |attempt: u32, delay: Duration, error: &GenerationError| {
            warn!(
                job_id = %job_id,
                attempt,
                max_attempts = config.max_attempts,
                wait_ms = delay.as_millis() as u64,
                error = %error,
                "Rate limited, backing off before retry"
            );
            inner.retries.fetch_add(1, Ordering::Relaxed);
            inner.with_job(seq, |job| {
                job.record_error(error);
                job.advance(JobState::RetryWaiting {
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                })
            });
        };

        let is_retryable = |error: &GenerationError| (inner.is_retryable)(error);
        let backoff = Backoff::new(config.initial_backoff, config.max_attempts);

        let outcome = tokio::time::timeout(
            config.job_timeout,
            with_retry(attempts, backoff, is_retryable, on_retry),
        )
        .await;

        match outcome {
            Ok(Ok(text)) => {
                entry.finish(JobState::Succeeded, None);
                info!(job_id = %job_id, "Task completed successfully");
                Ok(text)
            }
            Ok(Err(RetryError::Exhausted { attempts, last })) => {
                error!(job_id = %job_id, attempts, error = %last, "Max retries reached after rate limiting");
                entry.finish(JobState::Failed, Some(last.to_string()));
                Err(QueueError::RateLimitExhausted { job_id, attempts })
            }
            Ok(Err(RetryError::Fatal { attempt, error })) => {
                error!(job_id = %job_id, attempt, error = %error, "Non-retryable task error");
                entry.finish(JobState::Failed, Some(error.to_string()));
                Err(QueueError::Task(error))
            }
            Err(_) => {
                error!(
                    job_id = %job_id,
                    timeout_ms = config.job_timeout.as_millis() as u64,
                    "Task timed out"
                );
                entry.finish(JobState::Failed, Some("timed out".to_string()));
                Err(QueueError::TaskTimeout {
                    job_id,
                    timeout: config.job_timeout,
                })
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        let jobs = self.inner.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let queued = jobs.values().filter(|j| j.state == JobState::Queued).count();
        let in_flight = jobs.values().filter(|j| j.state.is_in_flight()).count();

        QueueStats {
            queued,
            in_flight,
            completed: self.inner.completed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
            retries: self.inner.retries.load(Ordering::Relaxed),
        }
    }

    /// Live jobs in submission order.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        let jobs = self.inner.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = jobs.iter().collect();
        entries.sort_by_key(|(seq, _)| **seq);
        entries.into_iter().map(|(_, job)| JobSnapshot::from(job)).collect()
    }

    /// Stops admitting jobs. Jobs still waiting for a slot fail with [`QueueError::Closed`];
    /// dispatched jobs run to completion.
    pub fn close(&self) {
        self.inner.slots.close();
    }
}
