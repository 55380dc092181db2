use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    /// Finished jobs per second since the run started.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 { 0.0 } else { self.completed as f64 / secs }
    }

    /// Estimated time for the remaining jobs, `None` while throughput is unknown.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.throughput();
        if rate > 0.0 {
            Some(Duration::from_secs_f64(self.remaining() as f64 / rate))
        } else {
            None
        }
    }
}

/// Counts terminal outcomes for one run. `record` is a single atomic
/// increment-and-read, so concurrent callers each observe a distinct count.
#[derive(Debug)]
pub struct ProgressTracker {
    completed: AtomicUsize,
    total: usize,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self::started_at(total, Instant::now())
    }

    pub fn started_at(total: usize, started: Instant) -> Self {
        Self { completed: AtomicUsize::new(0), total, started }
    }

    pub fn record(&self) -> Progress {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        Progress { completed, total: self.total, elapsed: self.started.elapsed() }
    }
}

/// Format an optional ETA as `HH:MM:SS`, or `--:--:--` when unknown.
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(d) => {
            let s = d.as_secs();
            format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
        }
        None => "--:--:--".to_string(),
    }
}
