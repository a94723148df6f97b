//! Shared helpers for integration tests: an in-memory object store that
//! records every call, and small file-tree builders.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use site_backup::cloud::{validate_manifest, ObjectStore, RetryPolicy, TransferConfig};
use site_backup::error::UploadError;
use site_backup::models::{CompletedPart, Credentials};

pub const MIB: u64 = 1024 * 1024;

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Put { key: String, len: usize },
    Create { key: String },
    UploadPart { part_number: i64, len: usize },
    Complete { part_numbers: Vec<i64> },
    Abort { upload_id: String },
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    objects: HashMap<String, Vec<u8>>,
    uploads: HashMap<String, BTreeMap<i64, (String, Bytes)>>,
    aborted: HashSet<String>,
    next_upload: usize,
    part_failures: HashMap<i64, usize>,
    put_failures: usize,
}

/// In-memory S3 stand-in.
#[derive(Default)]
pub struct RecordingStore {
    state: Mutex<State>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `part_number` fail transiently the next `times` attempts.
    pub fn fail_part(&self, part_number: i64, times: usize) {
        self.state.lock().unwrap().part_failures.insert(part_number, times);
    }

    /// Make the next `times` single-shot PUTs fail transiently.
    pub fn fail_put(&self, times: usize) {
        self.state.lock().unwrap().put_failures = times;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&format!("{}/{}", bucket, key))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    pub fn open_uploads(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }

    pub fn aborted(&self) -> usize {
        self.state.lock().unwrap().aborted.len()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    fn location(&self, bucket: &str, key: &str) -> String {
        format!("https://test.r2.example/{}/{}", bucket, key)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> Result<String, UploadError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Put {
            key: key.to_string(),
            len: body.len(),
        });
        if state.put_failures > 0 {
            state.put_failures -= 1;
            return Err(UploadError::Transient("HTTP 503 SlowDown".to_string()));
        }
        state.objects.insert(format!("{}/{}", bucket, key), body.to_vec());
        Ok(format!("\"put-{}\"", body.len()))
    }

    async fn create_multipart_upload(&self, _bucket: &str, key: &str) -> Result<String, UploadError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Create { key: key.to_string() });
        state.next_upload += 1;
        let upload_id = format!("upload-{}", state.next_upload);
        state.uploads.insert(upload_id.clone(), BTreeMap::new());
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i64,
        body: Bytes,
    ) -> Result<String, UploadError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::UploadPart {
            part_number,
            len: body.len(),
        });

        if let Some(remaining) = state.part_failures.get_mut(&part_number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(UploadError::Transient(format!("HTTP 503 on part {}", part_number)));
            }
        }

        let e_tag = format!("\"part-{}-{}\"", part_number, body.len());
        match state.uploads.get_mut(upload_id) {
            Some(parts) => {
                parts.insert(part_number, (e_tag.clone(), body));
                Ok(e_tag)
            }
            None => Err(UploadError::IncompleteUpload("HTTP 404 NoSuchUpload".to_string())),
        }
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<String, UploadError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Complete {
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });
        validate_manifest(&parts)?;

        let stored = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| UploadError::IncompleteUpload("HTTP 404 NoSuchUpload".to_string()))?;

        let mut object = Vec::new();
        for part in &parts {
            match stored.get(&part.part_number) {
                Some((e_tag, body)) if *e_tag == part.e_tag => object.extend_from_slice(body),
                _ => return Err(UploadError::IncompleteUpload("HTTP 400 InvalidPart".to_string())),
            }
        }

        state.objects.insert(format!("{}/{}", bucket, key), object);
        Ok(self.location(bucket, key))
    }

    async fn abort_multipart_upload(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<(), UploadError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Abort {
            upload_id: upload_id.to_string(),
        });
        state.uploads.remove(upload_id);
        state.aborted.insert(upload_id.to_string());
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("test-account", "AKIDTEST", "test-secret", "site-bucket")
}

/// Five-megabyte parts, five-megabyte threshold, millisecond backoff.
pub fn test_transfer_config() -> TransferConfig {
    TransferConfig {
        single_shot_threshold: 5 * MIB,
        part_size: 5 * MIB,
        concurrency: 2,
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        complete_retries: 1,
    }
}

/// Write `size` bytes of a repeating pattern.
pub fn write_file(path: &Path, size: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    fs::write(path, data).unwrap();
}

pub fn dir_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
