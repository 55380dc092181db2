/// Fatal errors raised while validating a run, before any job is scheduled.
/// Individual job failures are never reported through this type; they become
/// `[ERR]` outcomes instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The catalog (after filtering) contains no entries
    EmptyCatalog,
    /// Source location does not exist
    SourceNotFound(std::path::PathBuf),
    /// Source location exists but is not a directory
    SourceNotDir(std::path::PathBuf),
    /// Source directory could not be listed
    SourceUnreadable(std::path::PathBuf, String),
    /// Destination root could not be created
    CreateDestinationFailed(std::path::PathBuf, String),
    CatalogRead(std::path::PathBuf, String),
    CatalogParse(std::path::PathBuf, String),
    InvalidUrlTemplate(String),
    HttpClient(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use EngineError::*;
        match self {
            EmptyCatalog => write!(f, "catalog has no entries to process"),
            SourceNotFound(p) => write!(f, "source directory not found: {}", display_path(p)),
            SourceNotDir(p) => write!(f, "source is not a directory: {}", display_path(p)),
            SourceUnreadable(p, msg) => {
                write!(f, "cannot list source directory: {}: {}", display_path(p), msg)
            }
            CreateDestinationFailed(p, msg) => {
                write!(f, "cannot create destination directory: {}: {}", display_path(p), msg)
            }
            CatalogRead(p, msg) => write!(f, "cannot read catalog: {}: {}", display_path(p), msg),
            CatalogParse(p, msg) => {
                write!(f, "malformed catalog: {}: {}", display_path(p), msg)
            }
            InvalidUrlTemplate(t) => write!(f, "invalid base url: {}", t),
            HttpClient(msg) => write!(f, "cannot build http client: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Failure of a single transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Source file vanished between discovery and transfer
    SourceMissing(String),
    PermissionDenied(String),
    StorageFull(String),
    Io(String),
    Timeout(String),
    Connect(String),
    /// Server answered with a non-success status code
    HttpStatus(u16),
    Http(String),
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use JobError::*;
        match self {
            SourceMissing(s) => write!(f, "source vanished: {}", s),
            PermissionDenied(s) => write!(f, "permission denied: {}", s),
            StorageFull(s) => write!(f, "no space left on device: {}", s),
            Io(s) => write!(f, "io error: {}", s),
            Timeout(s) => write!(f, "timed out: {}", s),
            Connect(s) => write!(f, "connection failed: {}", s),
            HttpStatus(code) => write!(f, "http status {}", code),
            Http(s) => write!(f, "http error: {}", s),
        }
    }
}

impl std::error::Error for JobError {}

impl JobError {
    /// Whether a later attempt could plausibly succeed. Network hiccups,
    /// server-side 5xx/429 answers and generic IO errors are transient;
    /// missing sources, permissions, full disks and 4xx answers are not.
    pub fn is_transient(&self) -> bool {
        use JobError::*;
        match self {
            Timeout(_) | Connect(_) | Io(_) | Http(_) => true,
            HttpStatus(code) => *code == 408 || *code == 429 || *code >= 500,
            SourceMissing(_) | PermissionDenied(_) | StorageFull(_) => false,
        }
    }

    pub fn from_io(err: &std::io::Error) -> Self {
        use std::io::ErrorKind;
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => JobError::SourceMissing(msg),
            ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
                JobError::PermissionDenied(msg)
            }
            ErrorKind::StorageFull => JobError::StorageFull(msg),
            ErrorKind::TimedOut => JobError::Timeout(msg),
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => JobError::Connect(msg),
            _ => JobError::Io(msg),
        }
    }
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::from_io(&err)
    }
}

pub(crate) fn display_path(p: &std::path::Path) -> String {
    let s = p.to_string_lossy().to_string();
    if s.contains('\\') { s.replace('\\', "/") } else { s }
}
