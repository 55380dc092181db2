// transport: the byte-moving half of a job (local copy or http download)
mod copy;
mod http;

use std::path::{Path, PathBuf};

pub use copy::LocalCopy;
pub use http::HttpDownload;

use crate::error::JobError;

/// Where a job's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Local(PathBuf),
    Url(String),
}

impl SourceRef {
    /// Short name used in outcome lines: the file name of a local path or
    /// the last segment of a url.
    pub fn subject(&self) -> String {
        match self {
            SourceRef::Local(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| p.display().to_string()),
            SourceRef::Url(u) => {
                u.rsplit('/').find(|s| !s.is_empty()).unwrap_or(u.as_str()).to_string()
            }
        }
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRef::Local(p) => write!(f, "{}", crate::error::display_path(p)),
            SourceRef::Url(u) => f.write_str(u),
        }
    }
}

/// Moves the bytes of one source to one destination path. Implementations
/// must be shareable across worker threads; one call is one attempt and the
/// scheduler owns retries.
pub trait Transport: Send + Sync {
    /// Returns the number of bytes written.
    fn transfer(&self, source: &SourceRef, dest: &Path) -> Result<u64, JobError>;
}

/// Temporary sibling of `dest` that receives the bytes before the final rename.
pub(crate) fn part_path(dest: &Path) -> PathBuf {
    let file_name = dest.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}.romsync.part.{}", file_name, std::process::id()))
}

/// Move a finished temp file into place, removing it if the rename fails.
pub(crate) fn commit_part(tmp: &Path, dest: &Path) -> Result<(), JobError> {
    if let Err(e) = std::fs::rename(tmp, dest) {
        let _ = std::fs::remove_file(tmp);
        return Err(JobError::from_io(&e));
    }
    Ok(())
}
