use std::path::Path;

use filetime::FileTime;

use super::{SourceRef, Transport, commit_part, part_path};
use crate::error::JobError;

/// Byte-for-byte local copy that keeps the source modification time.
///
/// Data lands in a `.romsync.part.<pid>` sibling first and is renamed into
/// place, so an interrupted copy never leaves a truncated destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCopy;

impl Transport for LocalCopy {
    fn transfer(&self, source: &SourceRef, dest: &Path) -> Result<u64, JobError> {
        let SourceRef::Local(src) = source else {
            return Err(JobError::Io(format!("local copy cannot read {}", source)));
        };
        let meta = std::fs::metadata(src).map_err(|e| JobError::from_io(&e))?;
        if !meta.is_file() {
            return Err(JobError::SourceMissing(format!("not a regular file: {}", source)));
        }
        let tmp = part_path(dest);
        let bytes = match std::fs::copy(src, &tmp) {
            Ok(n) => n,
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                // NotFound here refers to the source unless the parent is gone
                return Err(JobError::from_io(&e));
            }
        };
        let mtime = FileTime::from_last_modification_time(&meta);
        if let Err(e) = filetime::set_file_mtime(&tmp, mtime) {
            tracing::debug!(path = %tmp.display(), error = %e, "could not preserve mtime");
        }
        commit_part(&tmp, dest)?;
        Ok(bytes)
    }
}
