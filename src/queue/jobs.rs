// Job records tracked by the generation queue

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Lifecycle of one submitted job.
///
/// ```text
/// Queued -> Dispatched -> Succeeded
///              |  ^    \-> Failed
///              v  |
///          RetryWaiting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Dispatched { attempt: u32 },
    RetryWaiting { attempt: u32, delay_ms: u64 },
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Dispatched { .. } | JobState::RetryWaiting { .. })
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(&self, next: &JobState) -> bool {
        match (self, next) {
            (JobState::Queued, JobState::Dispatched { attempt }) => *attempt == 1,
            // the queue was closed before the job got a slot
            (JobState::Queued, JobState::Failed) => true,
            (JobState::Dispatched { .. }, JobState::Succeeded | JobState::Failed) => true,
            (JobState::Dispatched { attempt }, JobState::RetryWaiting { attempt: waiting, .. }) => {
                attempt == waiting
            }
            (JobState::RetryWaiting { attempt, .. }, JobState::Dispatched { attempt: next }) => {
                *next == attempt + 1
            }
            (JobState::RetryWaiting { .. }, JobState::Failed) => true,
            _ => false,
        }
    }
}

/// Bookkeeping for one job. The task itself lives in the submitting future.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub state: JobState,
    pub attempts_remaining: u32,
    pub last_error: Option<String>,
    pub submitted_at: Instant,
}

impl Job {
    pub fn new(id: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            id: id.into(),
            state: JobState::Queued,
            attempts_remaining: max_attempts,
            last_error: None,
            submitted_at: Instant::now(),
        }
    }

    /// Moves to `next`; illegal transitions are ignored and reported as `false`.
    pub fn advance(&mut self, next: JobState) -> bool {
        if !self.state.can_advance_to(&next) {
            tracing::warn!(
                job_id = %self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring illegal job state transition"
            );
            return false;
        }
        if let JobState::Dispatched { .. } = next {
            self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        }
        self.state = next;
        true
    }

    pub fn record_error(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
    }

    pub fn waiting_for(&self) -> Duration {
        self.submitted_at.elapsed()
    }
}

/// Snapshot of a live job for status reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    #[serde(flatten)]
    pub state: JobState,
    pub attempts_remaining: u32,
    pub last_error: Option<String>,
    pub age_ms: u64,
}

impl From<&Job> for JobSnapshot {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            state: job.state,
            attempts_remaining: job.attempts_remaining,
            last_error: job.last_error.clone(),
            age_ms: job.waiting_for().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut job = Job::new("fundamentals-1", 3);
        assert!(job.advance(JobState::Dispatched { attempt: 1 }));
        assert_eq!(job.attempts_remaining, 2);
        assert!(job.advance(JobState::Succeeded));
        assert!(job.state.is_terminal());
    }

    #[test]
    fn test_retry_cycle() {
        let mut job = Job::new("strategy-1", 3);
        assert!(job.advance(JobState::Dispatched { attempt: 1 }));
        assert!(job.advance(JobState::RetryWaiting { attempt: 1, delay_ms: 15_000 }));
        assert!(job.state.is_in_flight());
        assert!(job.advance(JobState::Dispatched { attempt: 2 }));
        assert_eq!(job.attempts_remaining, 1);
        assert!(job.advance(JobState::Failed));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut job = Job::new("insights-1", 3);
        assert!(!job.advance(JobState::Succeeded));
        assert!(!job.advance(JobState::Dispatched { attempt: 2 }));
        assert_eq!(job.state, JobState::Queued);

        job.advance(JobState::Dispatched { attempt: 1 });
        job.advance(JobState::Succeeded);
        assert!(!job.advance(JobState::Dispatched { attempt: 2 }));
        assert!(!job.advance(JobState::Failed));
    }

    #[test]
    fn test_snapshot_serializes_state_tag() {
        let mut job = Job::new("insights-2", 3);
        job.advance(JobState::Dispatched { attempt: 1 });
        let json = serde_json::to_value(JobSnapshot::from(&job)).unwrap();
        assert_eq!(json["state"], "dispatched");
        assert_eq!(json["attempt"], 1);
        assert_eq!(json["attemptsRemaining"], 2);
    }
}
