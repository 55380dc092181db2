//! Run orchestration: resolve catalog entries, plan one job per resolved
//! entry, execute the jobs with bounded parallelism and aggregate outcomes.
//!
//! Fatal problems (empty catalog, destination root that cannot be created)
//! are returned as `EngineError` before anything is scheduled. Everything that
//! goes wrong afterwards is an outcome; a run always completes with a partial
//! success count.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::catalog::CatalogEntry;
use crate::error::EngineError;
use crate::job::{JobStatus, Outcome, TransferJob};
use crate::progress::{Progress, ProgressTracker};
use crate::scheduler::{JobScheduler, RetryPolicy, SchedulerConfig};
use crate::transport::{SourceRef, Transport};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workers: usize,
    pub retry: RetryPolicy,
    pub skip_if_exists: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { workers: 4, retry: RetryPolicy::default(), skip_if_exists: true }
    }
}

/// Receives progress and outcome notifications on the thread that called
/// `Engine::run`, one pair per terminal outcome.
pub trait RunObserver {
    fn on_progress(&mut self, _progress: &Progress) {}
    fn on_outcome(&mut self, _outcome: &Outcome) {}
}

impl RunObserver for () {}

/// Adapter turning two closures into an observer.
pub struct FnObserver<P, O> {
    pub on_progress: P,
    pub on_outcome: O,
}

impl<P, O> RunObserver for FnObserver<P, O>
where
    P: FnMut(usize, usize),
    O: FnMut(&str),
{
    fn on_progress(&mut self, progress: &Progress) {
        (self.on_progress)(progress.completed, progress.total)
    }

    fn on_outcome(&mut self, outcome: &Outcome) {
        (self.on_outcome)(&outcome.line())
    }
}

/// Aggregate of a finished (or cancelled) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    pub succeeded: usize,
    pub total: usize,
    pub skipped: usize,
    pub missing: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub bytes: u64,
    pub was_cancelled: bool,
    pub elapsed: Duration,
    /// Outcome records in the order they were recorded
    pub outcomes: Vec<Outcome>,
}

impl RunResult {
    fn record(&mut self, outcome: Outcome) {
        match outcome.status {
            JobStatus::Succeeded => self.succeeded += 1,
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::Missing => self.missing += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Pending | JobStatus::Running | JobStatus::Retrying => {}
        }
        self.bytes += outcome.bytes;
        self.outcomes.push(outcome);
    }

    /// Outcome lines, in recorded order.
    pub fn lines(&self) -> Vec<String> {
        self.outcomes.iter().map(Outcome::line).collect()
    }
}

/// Wires resolution, scheduling and aggregation together for one run.
pub struct Engine<'a> {
    transport: &'a dyn Transport,
    cancel: CancellationToken,
}

impl<'a> Engine<'a> {
    pub fn new(transport: &'a dyn Transport, cancel: CancellationToken) -> Self {
        Self { transport, cancel }
    }

    /// Run every catalog entry to a terminal outcome.
    ///
    /// `resolve` maps an entry to its source (or `None` → `[MISS]`);
    /// `destination_for` names the destination of a resolved entry. Both are
    /// called on the calling thread while planning.
    pub fn run<R, D>(
        &self,
        entries: &[CatalogEntry],
        destination_root: &Path,
        resolve: R,
        destination_for: D,
        config: &RunConfig,
        observer: &mut dyn RunObserver,
    ) -> Result<RunResult, EngineError>
    where
        R: Fn(&CatalogEntry) -> Option<SourceRef>,
        D: Fn(&CatalogEntry, &SourceRef) -> PathBuf,
    {
        if entries.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        std::fs::create_dir_all(destination_root).map_err(|e| {
            EngineError::CreateDestinationFailed(destination_root.to_path_buf(), e.to_string())
        })?;

        let started = Instant::now();
        let tracker = ProgressTracker::started_at(entries.len(), started);
        let mut result = RunResult { total: entries.len(), ..RunResult::default() };
        let mut emit = |outcome: Outcome, result: &mut RunResult| {
            let progress = tracker.record();
            observer.on_outcome(&outcome);
            observer.on_progress(&progress);
            result.record(outcome);
        };

        let (jobs, early) = plan(entries, resolve, destination_for);
        tracing::info!(
            entries = entries.len(),
            jobs = jobs.len(),
            unresolved = early.len(),
            workers = config.workers,
            "run planned"
        );
        for outcome in early {
            emit(outcome, &mut result);
        }

        let scheduler = JobScheduler::new(
            self.transport,
            SchedulerConfig {
                workers: config.workers,
                retry: config.retry.clone(),
                skip_if_exists: config.skip_if_exists,
            },
            self.cancel.clone(),
        );
        let (outcome_tx, outcome_rx) = unbounded::<Outcome>();
        std::thread::scope(|s| {
            s.spawn(move || scheduler.run(jobs, outcome_tx));
            for outcome in outcome_rx.iter() {
                emit(outcome, &mut result);
            }
        });

        result.was_cancelled = self.cancel.is_cancelled();
        result.elapsed = started.elapsed();
        tracing::info!(
            succeeded = result.succeeded,
            total = result.total,
            failed = result.failed,
            cancelled = result.was_cancelled,
            "run finished"
        );
        Ok(result)
    }
}

/// Split entries into jobs and immediate outcomes. Unresolved entries become
/// `[MISS]`; an entry whose destination is already claimed by an earlier job
/// becomes `[SKIP]` so that no two jobs ever write the same path.
fn plan<R, D>(
    entries: &[CatalogEntry],
    resolve: R,
    destination_for: D,
) -> (Vec<TransferJob>, Vec<Outcome>)
where
    R: Fn(&CatalogEntry) -> Option<SourceRef>,
    D: Fn(&CatalogEntry, &SourceRef) -> PathBuf,
{
    let mut jobs = Vec::new();
    let mut early = Vec::new();
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let Some(source) = resolve(entry) else {
            early.push(Outcome::missing(index, &entry.identifier, &entry.match_key));
            continue;
        };
        let destination = destination_for(entry, &source);
        let job = TransferJob::new(index, entry.identifier.clone(), source, destination);
        if !claimed.insert(job.destination.clone()) {
            tracing::debug!(identifier = %entry.identifier, "destination already claimed");
            early.push(job.outcome(JobStatus::Skipped).with_error("duplicate destination"));
            continue;
        }
        jobs.push(job);
    }
    (jobs, early)
}
