use async_trait::async_trait;
use bytes::Bytes;

use crate::error::UploadError;
use crate::models::CompletedPart;

/// The S3 operations the transfer orchestrator needs.
///
/// Implementations classify every failure as [`UploadError::Transient`],
/// [`UploadError::Permanent`], [`UploadError::Auth`] or
/// [`UploadError::IncompleteUpload`] at the point of detection; the
/// orchestrator decides what to retry based on that classification alone.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Public location of an object, used in the pipeline outcome.
    fn location(&self, bucket: &str, key: &str) -> String;

    /// Upload a whole object in one request. Returns its ETag.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<String, UploadError>;

    /// Start a multipart upload. Returns the upload id.
    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String, UploadError>;

    /// Upload one 1-based part. Returns the part ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i64,
        body: Bytes,
    ) -> Result<String, UploadError>;

    /// Assemble the object from parts sorted by part number. Returns the
    /// object location.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<String, UploadError>;

    /// Discard an upload and its parts. Aborting an unknown, already aborted
    /// or already completed upload succeeds.
    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), UploadError>;
}

/// Check a completion manifest: non-empty, strictly ascending, contiguous
/// from part 1.
pub fn validate_manifest(parts: &[CompletedPart]) -> Result<(), UploadError> {
    if parts.is_empty() {
        return Err(UploadError::IncompleteUpload("no parts to complete".to_string()));
    }

    for (index, part) in parts.iter().enumerate() {
        let expected = index as i64 + 1;
        if part.part_number != expected {
            return Err(UploadError::IncompleteUpload(format!(
                "expected part {} at position {}, found part {}",
                expected, index, part.part_number
            )));
        }
        if part.e_tag.is_empty() {
            return Err(UploadError::IncompleteUpload(format!(
                "part {} has no ETag",
                part.part_number
            )));
        }
    }

    Ok(())
}
