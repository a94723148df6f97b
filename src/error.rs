//! Error taxonomy for the backup pipeline.
//!
//! Faults are classified where they are detected: the archiver produces
//! [`ArchiveError`], the object store client and the transfer orchestrator
//! produce [`UploadError`]. The pipeline wraps either one in
//! [`PipelineError`] and tags it with the [`Stage`] that failed.

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failures raised while building the backup archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no space left on device while writing {path}")]
    DiskFull { path: PathBuf },

    #[error("permission denied: {path}")]
    Permission { path: PathBuf },

    #[error("archive limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("invalid exclude pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("archive task interrupted: {0}")]
    Interrupted(String),
}

impl ArchiveError {
    /// Classify an I/O error raised on `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if is_disk_full(&source) {
            ArchiveError::DiskFull { path }
        } else if source.kind() == io::ErrorKind::PermissionDenied {
            ArchiveError::Permission { path }
        } else {
            ArchiveError::Io { path, source }
        }
    }

    /// Classify a ZIP writer error raised while writing the artifact at `path`.
    pub fn from_zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        match source {
            zip::result::ZipError::Io(e) => Self::from_io(path, e),
            other => ArchiveError::Io {
                path: path.into(),
                source: io::Error::new(io::ErrorKind::Other, other.to_string()),
            },
        }
    }
}

/// True when the OS reports the destination volume (or quota) is full.
pub fn is_disk_full(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        matches!(err.raw_os_error(), Some(code) if code == libc::ENOSPC || code == libc::EDQUOT)
    }

    #[cfg(windows)]
    {
        // ERROR_HANDLE_DISK_FULL, ERROR_DISK_FULL
        matches!(err.raw_os_error(), Some(39) | Some(112))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = err;
        false
    }
}

/// Failures raised while transferring the artifact to the object store.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("object store rejected credentials: {0}")]
    Auth(String),

    #[error("transient object store failure: {0}")]
    Transient(String),

    #[error("object store rejected request: {0}")]
    Permanent(String),

    #[error("multipart upload incomplete: {0}")]
    IncompleteUpload(String),

    /// Transient failures outlasted the retry budget. `part_number` is 0 when
    /// the failed request belongs to the session rather than one part.
    #[error("{} failed after {attempts} attempts: {last_error}", request_label(.part_number))]
    UploadFailed {
        part_number: i64,
        attempts: usize,
        last_error: String,
    },

    #[error("failed to read artifact: {0}")]
    ArtifactRead(#[from] io::Error),
}

impl UploadError {
    /// Only transient faults are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadError::Transient(_))
    }

    /// Turn a transient error left over after `attempts` tries into
    /// `UploadFailed`; any other error passes through.
    pub fn exhausted(self, part_number: i64, attempts: usize) -> Self {
        match self {
            UploadError::Transient(message) => UploadError::UploadFailed {
                part_number,
                attempts,
                last_error: message,
            },
            other => other,
        }
    }
}

fn request_label(part_number: &i64) -> String {
    if *part_number > 0 {
        format!("part {}", part_number)
    } else {
        "multipart session request".to_string()
    }
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Archive,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Archive => write!(f, "archive"),
            Stage::Upload => write!(f, "upload"),
        }
    }
}

/// Error reported by the pipeline, verbatim from the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Archive(_) => Stage::Archive,
            PipelineError::Upload(_) => Stage::Upload,
        }
    }
}
