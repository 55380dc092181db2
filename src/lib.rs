pub mod cancel;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod matching;
pub mod normalize;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod transport;

pub use cancel::CancellationToken;
pub use catalog::{CatalogEntry, SourceFile};
pub use engine::{Engine, RunConfig, RunObserver, RunResult};
pub use error::EngineError;
pub use error::JobError;
pub use job::{JobStatus, Outcome};
pub use matching::{MatchIndex, MatchMode};
pub use normalize::normalize;
pub use scheduler::RetryPolicy;
pub use transport::{SourceRef, Transport};
