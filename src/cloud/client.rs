use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use log::{debug, warn};
use rusoto_core::{ByteStream, HttpClient, Region};
use rusoto_credential::StaticProvider;
use rusoto_s3::{
    AbortMultipartUploadRequest, CompleteMultipartUploadRequest,
    CompletedMultipartUpload, CompletedPart as S3CompletedPart, CreateMultipartUploadRequest,
    PutObjectRequest, S3Client, UploadPartRequest, S3,
};

use crate::cloud::classify::{abort_result, classify_rusoto};
use crate::cloud::store::{validate_manifest, ObjectStore};
use crate::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, R2_PROVIDER_HOST, R2_REGION};
use crate::error::UploadError;
use crate::models::{CompletedPart, Credentials};
use crate::utils::hash::content_md5;

/// S3 client for one R2 (or other S3-compatible) endpoint.
///
/// Requests are SigV4-signed by rusoto with the static access/secret key
/// pair and sent path-style to `<endpoint>/<bucket>/<key>`. Every call is
/// bounded by `request_timeout`; running out of time counts as transient.
#[derive(Clone)]
pub struct R2ObjectStore {
    client: Arc<S3Client>,
    endpoint: String,
    request_timeout: Duration,
}

impl R2ObjectStore {
    /// Build a client for the account's R2 endpoint.
    pub fn new(credentials: &Credentials) -> Result<Self, UploadError> {
        Self::with_endpoint(credentials, &credentials.endpoint(R2_PROVIDER_HOST))
    }

    /// Build a client for an explicit S3-compatible endpoint.
    pub fn with_endpoint(credentials: &Credentials, endpoint: &str) -> Result<Self, UploadError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let region = Region::Custom {
            name: R2_REGION.to_string(),
            endpoint: endpoint.clone(),
        };

        let provider = StaticProvider::new_minimal(
            credentials.access_key.clone(),
            credentials.secret_key.clone(),
        );
        let http_client = HttpClient::new()
            .map_err(|e| UploadError::Permanent(format!("failed to create HTTP client: {}", e)))?;

        debug!("Created object store client for {}", endpoint);

        Ok(Self {
            client: Arc::new(S3Client::new_with(http_client, provider, region)),
            endpoint,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn timed<T, F>(&self, operation: &str, request: F) -> Result<T, UploadError>
    where
        F: Future<Output = Result<T, UploadError>>,
    {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(UploadError::Transient(format!(
                "{} timed out after {:?}",
                operation, self.request_timeout
            ))),
        }
    }
}

/// Request body sharing the caller's buffer.
fn byte_stream(body: Bytes) -> ByteStream {
    let len = body.len();
    ByteStream::new_with_size(stream::once(async move { Ok::<_, std::io::Error>(body) }), len)
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    fn location(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<String, UploadError> {
        let request = PutObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_length: Some(body.len() as i64),
            content_md5: Some(content_md5(&body)),
            content_type: Some("application/zip".to_string()),
            body: Some(byte_stream(body)),
            ..Default::default()
        };

        let output = self
            .timed("PutObject", async {
                self.client.put_object(request).await.map_err(classify_rusoto)
            })
            .await?;

        Ok(output.e_tag.unwrap_or_default())
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String, UploadError> {
        let request = CreateMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: Some("application/zip".to_string()),
            ..Default::default()
        };

        let output = self
            .timed("CreateMultipartUpload", async {
                self.client
                    .create_multipart_upload(request)
                    .await
                    .map_err(classify_rusoto)
            })
            .await?;

        output
            .upload_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| UploadError::Permanent("no upload ID returned by the store".to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i64,
        body: Bytes,
    ) -> Result<String, UploadError> {
        let request = UploadPartRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            part_number,
            content_length: Some(body.len() as i64),
            content_md5: Some(content_md5(&body)),
            body: Some(byte_stream(body)),
            ..Default::default()
        };

        let output = self
            .timed("UploadPart", async {
                self.client.upload_part(request).await.map_err(classify_rusoto)
            })
            .await?;

        // A part without an ETag cannot be completed; ask for another attempt
        output
            .e_tag
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| UploadError::Transient(format!("no ETag returned for part {}", part_number)))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<String, UploadError> {
        validate_manifest(&parts)?;

        let request = CompleteMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            multipart_upload: Some(CompletedMultipartUpload {
                parts: Some(
                    parts
                        .into_iter()
                        .map(|part| S3CompletedPart {
                            e_tag: Some(part.e_tag),
                            part_number: Some(part.part_number),
                        })
                        .collect(),
                ),
            }),
            ..Default::default()
        };

        let output = self
            .timed("CompleteMultipartUpload", async {
                self.client
                    .complete_multipart_upload(request)
                    .await
                    .map_err(classify_rusoto)
            })
            .await?;

        Ok(output
            .location
            .filter(|location| !location.is_empty())
            .unwrap_or_else(|| self.location(bucket, key)))
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), UploadError> {
        let request = AbortMultipartUploadRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            ..Default::default()
        };

        let result = self
            .timed("AbortMultipartUpload", async {
                match self.client.abort_multipart_upload(request).await {
                    Ok(_) => Ok(()),
                    Err(e) => abort_result(e).map(|()| debug!("Upload {} already gone", upload_id)),
                }
            })
            .await;

        if let Err(ref e) = result {
            warn!("AbortMultipartUpload for {} failed: {}", upload_id, e);
        }
        result
    }
}
