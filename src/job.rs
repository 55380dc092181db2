use std::path::PathBuf;

use serde::Serialize;

use crate::transport::SourceRef;

/// Lifecycle of a transfer job. The last five variants are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Skipped,
    Missing,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded
                | JobStatus::Skipped
                | JobStatus::Missing
                | JobStatus::Failed
                | JobStatus::Cancelled
        )
    }

    /// Prefix used in outcome lines.
    pub fn tag(&self) -> &'static str {
        match self {
            JobStatus::Succeeded => "OK",
            JobStatus::Skipped => "SKIP",
            JobStatus::Missing => "MISS",
            JobStatus::Failed => "ERR",
            JobStatus::Cancelled => "CANCEL",
            JobStatus::Pending => "PENDING",
            JobStatus::Running | JobStatus::Retrying => "RUN",
        }
    }
}

/// One unit of work: move `source` to `destination`.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Position of the originating entry in the catalog
    pub index: usize,
    pub identifier: String,
    pub source: SourceRef,
    pub destination: PathBuf,
    pub status: JobStatus,
}

impl TransferJob {
    pub fn new(index: usize, identifier: String, source: SourceRef, destination: PathBuf) -> Self {
        Self { index, identifier, source, destination, status: JobStatus::Pending }
    }

    pub fn destination_name(&self) -> String {
        self.destination.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
    }

    /// Terminal record for this job.
    pub fn outcome(&self, status: JobStatus) -> Outcome {
        let subject = self.source.subject();
        let dest_name = self.destination_name();
        let (subject, renamed) = match status {
            JobStatus::Skipped => (dest_name, None),
            _ if dest_name != subject => (subject, Some(dest_name)),
            _ => (subject, None),
        };
        Outcome {
            index: self.index,
            identifier: self.identifier.clone(),
            status,
            subject,
            renamed,
            destination: Some(self.destination.clone()),
            error: None,
            attempts: 0,
            bytes: 0,
        }
    }
}

/// Terminal record emitted exactly once per catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub index: usize,
    pub identifier: String,
    pub status: JobStatus,
    pub subject: String,
    pub renamed: Option<String>,
    pub destination: Option<PathBuf>,
    pub error: Option<String>,
    pub attempts: u32,
    pub bytes: u64,
}

impl Outcome {
    /// Record for an entry that resolved to no source.
    pub fn missing(index: usize, identifier: &str, match_key: &str) -> Self {
        let subject = if match_key.is_empty() || match_key == identifier {
            identifier.to_string()
        } else {
            format!("{} - {}", identifier, match_key)
        };
        Outcome {
            index,
            identifier: identifier.to_string(),
            status: JobStatus::Missing,
            subject,
            renamed: None,
            destination: None,
            error: None,
            attempts: 0,
            bytes: 0,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// `[TAG] subject[ -> renamed][: error]`
    pub fn line(&self) -> String {
        let mut line = format!("[{}] {}", self.status.tag(), self.subject);
        if let Some(renamed) = &self.renamed {
            line.push_str(" -> ");
            line.push_str(renamed);
        }
        if let Some(err) = &self.error {
            if self.status == JobStatus::Skipped {
                line.push_str(&format!(" ({})", err));
            } else {
                line.push_str(": ");
                line.push_str(err);
            }
        }
        line
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.line())
    }
}
