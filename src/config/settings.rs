use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::{ArchiveLimits, Archiver};
use crate::cloud::{RetryPolicy, TransferConfig};
use crate::constants::{
    COMPLETE_RETRIES, DEFAULT_ARTIFACT_PREFIX, DEFAULT_PART_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS,
    ENV_ACCESS_KEY, ENV_ACCOUNT_ID, ENV_BUCKET, ENV_ENDPOINT, ENV_SECRET_KEY,
    MAX_PART_CONCURRENCY, MAX_UPLOAD_RETRIES, R2_PROVIDER_HOST, RETRY_BASE_DELAY_MS,
    RETRY_MAX_DELAY_SECS, SINGLE_SHOT_THRESHOLD,
};
use crate::models::{BackupJob, Credentials};

const MIB: u64 = 1024 * 1024;

/// Settings file for the backup tool.
///
/// Every field has a default so a partial file (or an empty one) is valid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub credentials: Credentials,

    /// Explicit S3 endpoint; overrides the one derived from the account id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_provider_host")]
    pub provider_host: String,

    #[serde(default)]
    pub backup: BackupSettings,

    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BackupSettings {
    #[serde(default)]
    pub source_root: Option<PathBuf>,

    /// Patterns added to the built-in exclusions.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Where artifacts are staged; the platform temp dir when unset.
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    #[serde(default)]
    pub key_prefix: Option<String>,

    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    #[serde(default)]
    pub limits: LimitSettings,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitSettings {
    #[serde(default)]
    pub max_file_size_mb: Option<u64>,
    #[serde(default)]
    pub max_total_size_mb: Option<u64>,
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    #[serde(default = "default_threshold_mb")]
    pub single_shot_threshold_mb: u64,

    #[serde(default = "default_part_size_mb")]
    pub part_size_mb: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Parts in flight; `min(4, cpus)` when unset.
    #[serde(default)]
    pub concurrency: Option<usize>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_provider_host() -> String {
    R2_PROVIDER_HOST.to_string()
}

fn default_artifact_prefix() -> String {
    DEFAULT_ARTIFACT_PREFIX.to_string()
}

fn default_threshold_mb() -> u64 {
    SINGLE_SHOT_THRESHOLD / MIB
}

fn default_part_size_mb() -> u64 {
    DEFAULT_PART_SIZE / MIB
}

fn default_max_attempts() -> usize {
    MAX_UPLOAD_RETRIES
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_retry_base_delay_ms() -> u64 {
    RETRY_BASE_DELAY_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            endpoint: None,
            provider_host: default_provider_host(),
            backup: BackupSettings::default(),
            transfer: TransferSettings::default(),
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            source_root: None,
            exclude: Vec::new(),
            temp_dir: None,
            key_prefix: None,
            artifact_prefix: default_artifact_prefix(),
            limits: LimitSettings::default(),
        }
    }
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            single_shot_threshold_mb: default_threshold_mb(),
            part_size_mb: default_part_size_mb(),
            max_attempts: default_max_attempts(),
            concurrency: None,
            request_timeout_secs: default_request_timeout_secs(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read settings file: {}", path.display()))?;

        let settings = Self::from_yaml_str(&content)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse YAML settings")
    }

    /// Save settings to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize settings to YAML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, yaml).context(format!("Failed to write settings to {}", path.display()))?;

        info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Write a template with empty credentials.
    pub fn create_default_file(path: &Path) -> Result<()> {
        Self::default().save_to_yaml_file(path)
    }

    /// Apply `SITE_BACKUP_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable lookup. Empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = value(ENV_ACCOUNT_ID) {
            self.credentials.account_id = v;
        }
        if let Some(v) = value(ENV_ACCESS_KEY) {
            self.credentials.access_key = v;
        }
        if let Some(v) = value(ENV_SECRET_KEY) {
            self.credentials.secret_key = v;
        }
        if let Some(v) = value(ENV_BUCKET) {
            self.credentials.bucket = v;
        }
        if let Some(v) = value(ENV_ENDPOINT) {
            self.endpoint = Some(v);
        }
    }

    /// Endpoint the store client talks to.
    pub fn endpoint(&self) -> String {
        match self.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => self.credentials.endpoint(&self.provider_host),
        }
    }

    pub fn archive_limits(&self) -> ArchiveLimits {
        let limits = &self.backup.limits;
        ArchiveLimits {
            max_file_size: limits.max_file_size_mb.map(|mb| mb * MIB),
            max_total_size: limits.max_total_size_mb.map(|mb| mb * MIB),
            max_duration: limits.max_duration_secs.map(Duration::from_secs),
        }
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.backup
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn archiver(&self) -> Archiver {
        Archiver::new(self.temp_dir())
            .with_prefix(&self.backup.artifact_prefix)
            .with_limits(self.archive_limits())
    }

    pub fn transfer_config(&self) -> TransferConfig {
        let transfer = &self.transfer;
        TransferConfig {
            single_shot_threshold: transfer.single_shot_threshold_mb * MIB,
            part_size: transfer.part_size_mb * MIB,
            concurrency: transfer
                .concurrency
                .unwrap_or_else(|| std::cmp::min(MAX_PART_CONCURRENCY, num_cpus::get()))
                .max(1),
            request_timeout: Duration::from_secs(transfer.request_timeout_secs),
            retry: RetryPolicy {
                max_attempts: transfer.max_attempts.max(1),
                base_delay: Duration::from_millis(transfer.retry_base_delay_ms),
                max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
            },
            complete_retries: COMPLETE_RETRIES,
        }
    }

    /// Build the job for one run. Command-line values take precedence.
    pub fn backup_job(
        &self,
        source: Option<&Path>,
        extra_excludes: &[String],
        key_prefix: Option<&str>,
    ) -> Result<BackupJob> {
        let root = source
            .map(Path::to_path_buf)
            .or_else(|| self.backup.source_root.clone())
            .ok_or_else(|| anyhow!("No source directory given (use --source or backup.source_root)"))?;

        let prefix = key_prefix
            .map(str::to_string)
            .or_else(|| self.backup.key_prefix.clone());

        Ok(BackupJob::new(root, self.credentials.clone())
            .with_excludes(self.backup.exclude.iter().chain(extra_excludes.iter()).cloned())
            .with_key_prefix(prefix))
    }
}
