use std::future::Future;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::cloud::plan::{PartRange, UploadPlan};
use crate::cloud::session::UploadSession;
use crate::cloud::store::ObjectStore;
use crate::constants::{
    COMPLETE_RETRIES, DEFAULT_PART_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS, MAX_PART_CONCURRENCY,
    MAX_UPLOAD_RETRIES, RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_SECS, SINGLE_SHOT_THRESHOLD,
};
use crate::error::UploadError;
use crate::models::{Artifact, Credentials, UploadResult};
use crate::security::scrub_credentials;

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_UPLOAD_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .checked_mul(2u32.pow(exponent))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is reached. The error carries the attempt count.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, (UploadError, usize)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} attempt {} failed, retrying in {:?}: {}",
                        what,
                        attempt,
                        delay,
                        scrub_credentials(&e.to_string())
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err((e, attempt)),
            }
        }
    }
}

/// Tunables for one transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Artifacts up to this size go in a single PUT.
    pub single_shot_threshold: u64,
    pub part_size: u64,
    /// Parts in flight at once.
    pub concurrency: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Extra attempts for a transient completion failure.
    pub complete_retries: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            single_shot_threshold: SINGLE_SHOT_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
            concurrency: std::cmp::min(MAX_PART_CONCURRENCY, num_cpus::get()),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            complete_retries: COMPLETE_RETRIES,
        }
    }
}

/// Object key for an artifact: its file name, under `prefix` when given.
pub fn object_key(prefix: Option<&str>, file_name: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, file_name),
        None => file_name.to_string(),
    }
}

/// Sends artifacts to an object store.
///
/// Small artifacts go in one PUT; larger ones are split into parts uploaded
/// with bounded concurrency. Transient part failures are retried with
/// backoff. A transient error never escapes: once retries run out it is
/// reported as [`UploadError::UploadFailed`]. Anything else aborts the
/// upload and is returned unchanged.
pub struct TransferOrchestrator {
    store: Arc<dyn ObjectStore>,
    config: TransferConfig,
}

impl TransferOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Upload `artifact` to the bucket named in `credentials`.
    pub async fn upload(
        &self,
        artifact: &Artifact,
        credentials: &Credentials,
        key_prefix: Option<&str>,
    ) -> Result<UploadResult, UploadError> {
        let bucket = credentials.bucket.as_str();
        let key = object_key(key_prefix, &artifact.file_name());
        let plan = UploadPlan::for_size(
            artifact.size_bytes,
            self.config.single_shot_threshold,
            self.config.part_size,
        )?;

        info!(
            "Uploading {} ({} bytes) to {}/{}",
            artifact.path.display(),
            artifact.size_bytes,
            bucket,
            key
        );

        let result = match plan {
            UploadPlan::SingleShot { size } => {
                self.upload_single(&artifact.path, bucket, &key, size).await?
            }
            UploadPlan::Multipart { part_count, .. } => {
                debug!("Uploading {} in {} parts", key, part_count);
                self.upload_multipart(&artifact.path, bucket, &key, plan).await?
            }
        };

        info!("Uploaded {} to {}", result.key, result.location);
        Ok(result)
    }

    async fn upload_single(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        size: u64,
    ) -> Result<UploadResult, UploadError> {
        let body = Bytes::from(tokio::fs::read(path).await?);
        if body.len() as u64 != size {
            return Err(UploadError::ArtifactRead(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("artifact changed size: expected {} bytes, read {}", size, body.len()),
            )));
        }

        // One request only; a transient failure is reported, not resent
        let e_tag = self
            .store
            .put_object(bucket, key, body)
            .await
            .map_err(|e| e.exhausted(1, 1))?;

        Ok(UploadResult {
            key: key.to_string(),
            location: self.store.location(bucket, key),
            e_tag: Some(e_tag),
            parts: 0,
            bytes: size,
        })
    }

    async fn upload_multipart(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        plan: UploadPlan,
    ) -> Result<UploadResult, UploadError> {
        let mut session = UploadSession::new(Arc::clone(&self.store), bucket, key);
        let upload_id = session
            .begin()
            .await
            .map_err(|e| e.exhausted(0, 1))?
            .to_string();
        let id = upload_id.as_str();

        let concurrency = self.config.concurrency.max(1);
        let mut uploads = stream::iter(plan.parts())
            .map(move |range| self.upload_part(path, bucket, key, id, range))
            .buffer_unordered(concurrency);

        let mut failure = None;
        while let Some(result) = uploads.next().await {
            match result {
                Ok((part_number, e_tag)) => session.record_part(part_number, e_tag),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        // Dropping the stream cancels parts still in flight
        drop(uploads);

        if let Some(e) = failure {
            warn!(
                "Aborting multipart upload {}: {}",
                upload_id,
                scrub_credentials(&e.to_string())
            );
            session.abort().await;
            return Err(e);
        }

        let location = self.complete(&mut session).await?;
        Ok(UploadResult {
            key: key.to_string(),
            location,
            e_tag: None,
            parts: session.ordered_parts().len(),
            bytes: plan.total_size(),
        })
    }

    async fn upload_part(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        upload_id: &str,
        range: PartRange,
    ) -> Result<(i64, String), UploadError> {
        let body = read_range(path, range).await?;
        let part_number = range.part_number;
        debug!("Uploading part {} ({} bytes)", part_number, range.len);

        let what = format!("Part {} upload", part_number);
        match self
            .config
            .retry
            .run(&what, || {
                self.store
                    .upload_part(bucket, key, upload_id, part_number, body.clone())
            })
            .await
        {
            Ok(e_tag) => Ok((part_number, e_tag)),
            Err((UploadError::Transient(message), attempts)) => Err(UploadError::UploadFailed {
                part_number,
                attempts,
                last_error: scrub_credentials(&message),
            }),
            Err((e, _)) => Err(e),
        }
    }

    async fn complete(&self, session: &mut UploadSession) -> Result<String, UploadError> {
        let mut retries = 0;
        loop {
            match session.complete().await {
                Ok(location) => return Ok(location),
                Err(e) if e.is_retryable() && retries < self.config.complete_retries => {
                    retries += 1;
                    let delay = self.config.retry.delay_for(retries);
                    warn!(
                        "Completing upload failed, retrying in {:?}: {}",
                        delay,
                        scrub_credentials(&e.to_string())
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    session.abort().await;
                    return Err(e.exhausted(0, retries + 1));
                }
            }
        }
    }
}

/// Read one part of the artifact from its offset.
async fn read_range(path: &Path, range: PartRange) -> Result<Bytes, UploadError> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(range.offset)).await?;

    let mut buffer = vec![0u8; range.len as usize];
    file.read_exact(&mut buffer).await?;
    Ok(Bytes::from(buffer))
}
