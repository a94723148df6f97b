use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_EXCLUDE_PATTERNS;
use crate::error::{PipelineError, Stage, UploadError};

/// Destination account and bucket for one backup.
///
/// Values are opaque strings; they are only checked for emptiness before the
/// first request; anything else is for the store to reject.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub bucket: String,
}

impl Credentials {
    pub fn new(account_id: &str, access_key: &str, secret_key: &str, bucket: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            bucket: bucket.to_string(),
        }
    }

    /// Reject empty fields before anything is archived.
    pub fn validate(&self) -> Result<(), UploadError> {
        let fields = [
            ("account_id", &self.account_id),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("bucket", &self.bucket),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(UploadError::Auth(format!(
                "missing credential fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// S3 endpoint for this account on the given provider host.
    pub fn endpoint(&self, provider_host: &str) -> String {
        format!("https://{}.{}", self.account_id, provider_host)
    }
}

// Keys never reach logs, even through `{:?}`.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// One backup run: what to archive and where to send it.
#[derive(Debug, Clone)]
pub struct BackupJob {
    pub root: PathBuf,
    pub exclude_patterns: Vec<String>,
    pub credentials: Credentials,
    pub key_prefix: Option<String>,
}

impl BackupJob {
    /// Create a job with the default exclusion patterns.
    pub fn new(root: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            root: root.into(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            credentials,
            key_prefix: None,
        }
    }

    /// Add extra exclusion patterns on top of the defaults.
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_key_prefix(mut self, prefix: Option<String>) -> Self {
        self.key_prefix = prefix.filter(|p| !p.trim_matches('/').is_empty());
        self
    }
}

/// The finished archive on local disk.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
    pub entries: usize,
    pub skipped: usize,
}

impl Artifact {
    /// File name of the artifact, used as the object key.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "backup.zip".to_string())
    }
}

/// A part acknowledged by the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i64,
    pub e_tag: String,
}

/// What the transfer orchestrator reports on success.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub key: String,
    pub location: String,
    pub e_tag: Option<String>,
    pub parts: usize,
    pub bytes: u64,
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub enum Outcome {
    Success {
        remote_location: String,
        key: String,
        size_bytes: u64,
        sha256: String,
    },
    Failure {
        stage: Stage,
        error: PipelineError,
    },
}

impl Outcome {
    pub fn failure(error: impl Into<PipelineError>) -> Self {
        let error = error.into();
        Outcome::Failure {
            stage: error.stage(),
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Operator-facing one-line summary.
    pub fn message(&self) -> String {
        match self {
            Outcome::Success { remote_location, .. } => {
                format!("Backup successfully uploaded to {}", remote_location)
            }
            Outcome::Failure { stage: Stage::Archive, error } => {
                format!("Backup failed: {}", error)
            }
            Outcome::Failure { stage: Stage::Upload, error } => {
                format!("Upload failed: {}", error)
            }
        }
    }

    /// Serializable form of the outcome for machine consumers.
    pub fn report(&self) -> OutcomeReport {
        match self {
            Outcome::Success { remote_location, key, size_bytes, sha256 } => OutcomeReport {
                success: true,
                stage: None,
                location: Some(remote_location.clone()),
                key: Some(key.clone()),
                size_bytes: Some(*size_bytes),
                sha256: Some(sha256.clone()),
                error: None,
            },
            Outcome::Failure { stage, error } => OutcomeReport {
                success: false,
                stage: Some(*stage),
                location: None,
                key: None,
                size_bytes: None,
                sha256: None,
                error: Some(error.to_string()),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct OutcomeReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
