use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Run-wide cooperative cancellation flag. Cloning shares the flag; once
/// cancelled it stays cancelled for the rest of the run.
///
/// Workers look at it only before starting a job and before each retry
/// attempt; an in-flight copy or request always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::info!("cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
