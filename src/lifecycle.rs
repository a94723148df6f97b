//! Temporary artifact lifecycle.
//!
//! Every archive written by the pipeline is owned by a guard from the moment
//! its file is created. [`PendingArtifact`] covers the file while the archiver
//! is still writing it; [`TempArtifact`] covers the finished archive until the
//! upload stage is over. Both delete the file when dropped, so a failed or
//! abandoned run never leaves an archive behind. Deletion failures are logged
//! and swallowed: a stray temp file must never hide the error that caused it.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};

use crate::constants::ARTIFACT_EXTENSION;
use crate::models::Artifact;

/// Build a collision-resistant artifact file name:
/// `<prefix>-<hostname>-<YYYYmmdd-HHMMSS>-<8 hex>.zip`.
pub fn artifact_file_name(prefix: &str) -> String {
    let host = hostname::get()
        .map(|h| sanitize_component(&h.to_string_lossy()))
        .unwrap_or_else(|_| "localhost".to_string());
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    format!(
        "{}-{}-{}-{}.{}",
        prefix,
        host,
        timestamp,
        &suffix[..8],
        ARTIFACT_EXTENSION
    )
}

fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    if cleaned.is_empty() {
        "localhost".to_string()
    } else {
        cleaned
    }
}

/// Delete an artifact file. Returns true when a file was removed.
///
/// A missing file is not an error; any other failure is logged only.
pub fn cleanup_backup(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed temporary artifact {}", path.display());
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove temporary artifact {}: {}", path.display(), e);
            false
        }
    }
}

/// Guard for an archive that is still being written.
#[derive(Debug)]
pub struct PendingArtifact {
    path: PathBuf,
    armed: bool,
}

impl PendingArtifact {
    /// Create a fresh, uniquely named file under `dir`.
    ///
    /// The file is opened with `create_new`, so two concurrent runs can never
    /// end up writing the same artifact.
    pub fn create(dir: &Path, prefix: &str) -> io::Result<(Self, File)> {
        fs::create_dir_all(dir)?;

        let path = dir.join(artifact_file_name(prefix));
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        debug!("Created temporary artifact {}", path.display());

        Ok((PendingArtifact { path, armed: true }, file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hand the finished file over to a [`TempArtifact`].
    pub fn complete(
        mut self,
        size_bytes: u64,
        sha256: String,
        entries: usize,
        skipped: usize,
    ) -> TempArtifact {
        self.armed = false;
        TempArtifact {
            artifact: Artifact {
                path: std::mem::take(&mut self.path),
                size_bytes,
                sha256,
                entries,
                skipped,
            },
            cleaned: false,
        }
    }
}

impl Drop for PendingArtifact {
    fn drop(&mut self) {
        if self.armed {
            debug!("Discarding partial artifact {}", self.path.display());
            cleanup_backup(&self.path);
        }
    }
}

/// Owner of a finished artifact until the pipeline run ends.
#[derive(Debug)]
pub struct TempArtifact {
    artifact: Artifact,
    cleaned: bool,
}

impl TempArtifact {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn path(&self) -> &Path {
        &self.artifact.path
    }

    /// Delete the artifact. Consumes the guard so it can only run once.
    pub fn cleanup_backup(mut self) -> bool {
        self.cleaned = true;
        cleanup_backup(&self.artifact.path)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.cleaned {
            warn!(
                "Artifact {} dropped without explicit cleanup, removing",
                self.artifact.path.display()
            );
            cleanup_backup(&self.artifact.path);
        }
    }
}
