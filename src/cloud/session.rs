use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::cloud::store::{validate_manifest, ObjectStore};
use crate::error::UploadError;
use crate::models::CompletedPart;
use crate::security::scrub_credentials;

/// Lifecycle of a multipart upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InProgress,
    Completed,
    Aborted,
}

/// One multipart upload on the store.
///
/// Moves `Idle -> InProgress -> Completed | Aborted`. A session dropped while
/// still in progress spawns a best-effort abort on the current tokio runtime,
/// so an abandoned upload does not leave orphaned parts on the store.
pub struct UploadSession {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key: String,
    upload_id: Option<String>,
    parts: BTreeMap<i64, String>,
    state: SessionState,
}

impl UploadSession {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: &str, key: &str) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: None,
            parts: BTreeMap::new(),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.as_deref()
    }

    /// Open the upload on the store.
    pub async fn begin(&mut self) -> Result<&str, UploadError> {
        if self.state != SessionState::Idle {
            return Err(UploadError::Permanent(format!(
                "cannot begin upload in state {:?}",
                self.state
            )));
        }

        let upload_id = self
            .store
            .create_multipart_upload(&self.bucket, &self.key)
            .await?;
        debug!("Started multipart upload {} for {}", upload_id, self.key);

        self.state = SessionState::InProgress;
        Ok(self.upload_id.insert(upload_id).as_str())
    }

    /// Record an acknowledged part. A later ETag for the same part number
    /// replaces the earlier one.
    pub fn record_part(&mut self, part_number: i64, e_tag: String) {
        if let Some(previous) = self.parts.insert(part_number, e_tag) {
            debug!("Part {} re-acknowledged, replacing ETag {}", part_number, previous);
        }
    }

    /// Acknowledged parts sorted by part number.
    pub fn ordered_parts(&self) -> Vec<CompletedPart> {
        self.parts
            .iter()
            .map(|(part_number, e_tag)| CompletedPart {
                part_number: *part_number,
                e_tag: e_tag.clone(),
            })
            .collect()
    }

    /// Finalize the upload. One request; the caller owns the retry decision.
    ///
    /// On failure the session stays in progress so it can be retried or
    /// aborted.
    pub async fn complete(&mut self) -> Result<String, UploadError> {
        let upload_id = match (self.state, self.upload_id.as_deref()) {
            (SessionState::InProgress, Some(id)) => id.to_string(),
            (state, _) => {
                return Err(UploadError::IncompleteUpload(format!(
                    "cannot complete upload in state {:?}",
                    state
                )))
            }
        };

        let parts = self.ordered_parts();
        validate_manifest(&parts)?;
        let part_count = parts.len();

        let location = self
            .store
            .complete_multipart_upload(&self.bucket, &self.key, &upload_id, parts)
            .await?;

        self.state = SessionState::Completed;
        debug!("Completed multipart upload {} with {} parts", upload_id, part_count);

        if location.is_empty() {
            Ok(self.store.location(&self.bucket, &self.key))
        } else {
            Ok(location)
        }
    }

    /// Abort the upload. Best effort: a failed abort is logged and the
    /// session is still considered aborted.
    pub async fn abort(&mut self) {
        if self.state != SessionState::InProgress {
            return;
        }
        self.state = SessionState::Aborted;

        if let Some(upload_id) = self.upload_id.as_deref() {
            match self
                .store
                .abort_multipart_upload(&self.bucket, &self.key, upload_id)
                .await
            {
                Ok(()) => debug!("Aborted multipart upload {}", upload_id),
                Err(e) => warn!(
                    "Failed to abort multipart upload {}: {}",
                    upload_id,
                    scrub_credentials(&e.to_string())
                ),
            }
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if self.state != SessionState::InProgress {
            return;
        }
        let upload_id = match self.upload_id.take() {
            Some(id) => id,
            None => return,
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Multipart upload {} abandoned, aborting", upload_id);
                let store = Arc::clone(&self.store);
                let bucket = std::mem::take(&mut self.bucket);
                let key = std::mem::take(&mut self.key);
                handle.spawn(async move {
                    if let Err(e) = store.abort_multipart_upload(&bucket, &key, &upload_id).await {
                        warn!(
                            "Failed to abort abandoned upload {}: {}",
                            upload_id,
                            scrub_credentials(&e.to_string())
                        );
                    }
                });
            }
            Err(_) => warn!(
                "Multipart upload {} abandoned outside a runtime, parts left on the store",
                upload_id
            ),
        }
    }
}
