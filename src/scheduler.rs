use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};

use crate::cancel::CancellationToken;
use crate::error::JobError;
use crate::job::{JobStatus, Outcome, TransferJob};
use crate::transport::Transport;

/// Delay strategy between attempts of one job.
pub trait Backoff: Send + Sync + std::fmt::Debug {
    /// Delay after failed attempt number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;

    fn pause(&self, attempt: u32) {
        let d = self.delay(attempt);
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

/// `base * attempt`: 1x after the first failure, 2x after the second, ...
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub base: Duration,
}

impl Backoff for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per job, including the first one (at least 1)
    pub max_attempts: u32,
    pub backoff: Arc<dyn Backoff>,
    /// Retry failures that `JobError::is_transient` rejects as well
    pub retry_non_transient: bool,
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Arc::new(LinearBackoff { base }),
            retry_non_transient: true,
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn retry_non_transient(mut self, yes: bool) -> Self {
        self.retry_non_transient = yes;
        self
    }

    fn should_retry(&self, err: &JobError, attempt: u32) -> bool {
        attempt < self.max_attempts && (self.retry_non_transient || err.is_transient())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(1))
    }
}

/// Result of driving one job through its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempted {
    Done { bytes: u64, attempts: u32 },
    Failed { error: JobError, attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Retry loop for one job: Running -> (Retrying -> Running)* -> terminal.
/// Cancellation is checked at each retry boundary, after the backoff pause.
pub fn drive_attempts<F>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    status: &mut JobStatus,
    mut op: F,
) -> Attempted
where
    F: FnMut(u32) -> Result<u64, JobError>,
{
    let mut attempt = 1u32;
    loop {
        *status = JobStatus::Running;
        match op(attempt) {
            Ok(bytes) => return Attempted::Done { bytes, attempts: attempt },
            Err(error) => {
                if !policy.should_retry(&error, attempt) {
                    return Attempted::Failed { error, attempts: attempt };
                }
                *status = JobStatus::Retrying;
                tracing::debug!(attempt, error = %error, "attempt failed, backing off");
                policy.backoff.pause(attempt);
                if cancel.is_cancelled() {
                    return Attempted::Cancelled { attempts: attempt };
                }
                attempt += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub workers: usize,
    pub retry: RetryPolicy,
    pub skip_if_exists: bool,
}

/// Bounded-parallelism executor. Each job ends in exactly one `Outcome`
/// sent to the outcome channel; the caller owns aggregation.
pub struct JobScheduler<'a> {
    transport: &'a dyn Transport,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl<'a> JobScheduler<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self { transport, config, cancel }
    }

    /// Run all jobs and block until every worker has drained the queue.
    /// Jobs are queued in the given order; completion order is unspecified.
    pub fn run(&self, jobs: Vec<TransferJob>, outcome_tx: Sender<Outcome>) {
        if jobs.is_empty() {
            return;
        }
        let workers = self.config.workers.clamp(1, jobs.len());
        let (job_tx, job_rx) = unbounded::<TransferJob>();
        for job in jobs {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        std::thread::scope(|s| {
            for worker_id in 0..workers {
                let job_rx = job_rx.clone();
                let outcome_tx = outcome_tx.clone();
                s.spawn(move || {
                    while let Ok(mut job) = job_rx.recv() {
                        let outcome = self.execute(worker_id, &mut job);
                        debug_assert!(job.status.is_terminal());
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                    tracing::debug!(worker_id, "worker drained queue");
                });
            }
        });
    }

    fn execute(&self, worker_id: usize, job: &mut TransferJob) -> Outcome {
        if self.cancel.is_cancelled() {
            job.status = JobStatus::Cancelled;
            return job.outcome(JobStatus::Cancelled);
        }
        job.status = JobStatus::Running;
        if self.config.skip_if_exists && job.destination.exists() {
            job.status = JobStatus::Skipped;
            tracing::debug!(worker_id, dest = %job.destination.display(), "destination exists");
            return job.outcome(JobStatus::Skipped);
        }

        let source = job.source.clone();
        let destination = job.destination.clone();
        let result = drive_attempts(&self.config.retry, &self.cancel, &mut job.status, |attempt| {
            tracing::debug!(worker_id, attempt, source = %source, "transfer attempt");
            self.transport.transfer(&source, &destination)
        });

        match result {
            Attempted::Done { bytes, attempts } => {
                job.status = JobStatus::Succeeded;
                let mut out = job.outcome(JobStatus::Succeeded);
                out.attempts = attempts;
                out.bytes = bytes;
                out
            }
            Attempted::Failed { error, attempts } => {
                job.status = JobStatus::Failed;
                tracing::warn!(worker_id, source = %source, attempts, error = %error, "job failed");
                let mut out = job.outcome(JobStatus::Failed).with_error(error.to_string());
                out.attempts = attempts;
                out
            }
            Attempted::Cancelled { attempts } => {
                job.status = JobStatus::Cancelled;
                let mut out = job.outcome(JobStatus::Cancelled);
                out.attempts = attempts;
                out
            }
        }
    }
}
