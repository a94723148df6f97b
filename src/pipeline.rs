//! The backup pipeline: archive, upload, clean up, report.

use std::sync::Arc;

use log::{error, info};

use crate::archive::Archiver;
use crate::cloud::{ObjectStore, R2ObjectStore, TransferConfig, TransferOrchestrator};
use crate::config::Settings;
use crate::error::{ArchiveError, UploadError};
use crate::models::{BackupJob, Outcome};
use crate::security::scrub_credentials;

/// Runs backup jobs against one object store.
///
/// Each run archives the job's tree on the blocking pool, uploads the
/// artifact and deletes it again, whatever the upload did. Failures are
/// reported in the [`Outcome`]; nothing is retried at this level.
pub struct PipelineController {
    store: Arc<dyn ObjectStore>,
    archiver: Archiver,
    transfer: TransferConfig,
}

impl PipelineController {
    pub fn new(store: Arc<dyn ObjectStore>, archiver: Archiver, transfer: TransferConfig) -> Self {
        Self {
            store,
            archiver,
            transfer,
        }
    }

    pub async fn run_backup(&self, job: &BackupJob) -> Outcome {
        if let Err(e) = job.credentials.validate() {
            error!("Backup not started: {}", e);
            return Outcome::failure(e);
        }

        info!("Starting backup of {}", job.root.display());

        let archiver = self.archiver.clone();
        let root = job.root.clone();
        let patterns = job.exclude_patterns.clone();
        let archived =
            tokio::task::spawn_blocking(move || archiver.create_backup(&root, patterns.as_slice()))
                .await;

        let temp = match archived {
            Ok(Ok(temp)) => temp,
            Ok(Err(e)) => {
                error!("Backup failed: {}", e);
                return Outcome::failure(e);
            }
            Err(e) => {
                let e = ArchiveError::Interrupted(e.to_string());
                error!("Backup failed: {}", e);
                return Outcome::failure(e);
            }
        };

        let orchestrator = TransferOrchestrator::new(Arc::clone(&self.store), self.transfer.clone());
        let uploaded = orchestrator
            .upload(temp.artifact(), &job.credentials, job.key_prefix.as_deref())
            .await;

        let artifact = temp.artifact().clone();
        temp.cleanup_backup();

        match uploaded {
            Ok(result) => {
                info!(
                    "Backup of {} uploaded to {} ({} bytes, {} entries)",
                    job.root.display(),
                    result.location,
                    artifact.size_bytes,
                    artifact.entries
                );
                Outcome::Success {
                    remote_location: result.location,
                    key: result.key,
                    size_bytes: artifact.size_bytes,
                    sha256: artifact.sha256,
                }
            }
            Err(e) => {
                error!("Upload failed: {}", scrub_credentials(&e.to_string()));
                Outcome::failure(e)
            }
        }
    }
}

/// Run one backup against the store described by `settings`.
pub async fn run_backup(job: &BackupJob, settings: &Settings) -> Outcome {
    if let Err(e) = job.credentials.validate() {
        error!("Backup not started: {}", e);
        return Outcome::failure(e);
    }

    let transfer = settings.transfer_config();
    let store = match R2ObjectStore::with_endpoint(&job.credentials, &settings.endpoint()) {
        Ok(store) => store.with_timeout(transfer.request_timeout),
        Err(e) => {
            error!("Could not create object store client: {}", e);
            return Outcome::failure(e);
        }
    };

    PipelineController::new(Arc::new(store), settings.archiver(), transfer)
        .run_backup(job)
        .await
}
