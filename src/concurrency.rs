// Worker-count selection, kept separate for testing.

/// Hard ceiling for explicitly requested workers (network-bound runs).
pub const MAX_WORKERS: usize = 64;
/// Ceiling for the automatic choice on local disk copies.
pub const AUTO_COPY_CAP: usize = 8;
/// Default for downloads when nothing is configured.
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    LocalCopy,
    Download,
}

/// Pick the worker count for a run. `requested == 0` means automatic:
/// available cores capped at 8 for copies, 16 for downloads. Explicit values
/// are clamped to [1, 64]. Never more workers than jobs.
pub fn choose_workers(kind: WorkloadKind, requested: usize, total_jobs: usize, cores: usize) -> usize {
    let mut workers = if requested == 0 {
        match kind {
            WorkloadKind::LocalCopy => cores.clamp(1, AUTO_COPY_CAP),
            WorkloadKind::Download => DEFAULT_DOWNLOAD_WORKERS,
        }
    } else {
        requested.clamp(1, MAX_WORKERS)
    };
    workers = std::cmp::min(workers, std::cmp::max(1, total_jobs));
    workers
}

/// Number of cores as reported by the OS, 4 when unknown.
pub fn available_cores() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
