//! Global constants for the site-backup pipeline.
//!
//! This module centralizes the hardcoded defaults so that every tunable
//! value used by the archiver and the transfer layer lives in one place.
//! Most of them can be overridden through the settings file.

// Archive constants
/// Buffer size used when streaming a source file into the archive (1MB)
pub const ARCHIVE_COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Files above this size are deflated with the fastest level (100MB)
pub const LARGE_FILE_COMPRESSION_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Files above this size need ZIP64 entries
pub const ZIP64_ENTRY_THRESHOLD: u64 = u32::MAX as u64;

/// Default file name prefix for backup artifacts
pub const DEFAULT_ARTIFACT_PREFIX: &str = "site-backup";

/// Extension of backup artifacts
pub const ARTIFACT_EXTENSION: &str = "zip";

/// Patterns always excluded from a backup, matched against the
/// `/`-separated path relative to the backup root.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    r"(^|/)\.git(/|$)",
    r"(^|/)\.svn(/|$)",
    r"(^|/)\.hg(/|$)",
    r"(^|/)site-backup-[^/]*\.zip$",
];

/// Extensions that are already compressed and stored as-is
pub const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "gz", "tgz", "xz", "bz2", "7z", "rar", "zst", "jpg", "jpeg", "png", "gif", "webp",
    "mp3", "mp4", "avi", "mov", "mpg", "mpeg", "woff", "woff2",
];

// Object store constants
/// Host suffix of the Cloudflare R2 S3 endpoint
pub const R2_PROVIDER_HOST: &str = "r2.cloudflarestorage.com";

/// Signing region used for R2
pub const R2_REGION: &str = "auto";

/// Artifacts up to this size are uploaded with a single PUT (5MB)
pub const SINGLE_SHOT_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Default multipart part size (8MB)
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// S3 minimum part size for multipart uploads, except the last part (5MB)
pub const S3_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// S3 maximum part size (5GB)
pub const S3_MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// S3 maximum parts per upload
pub const S3_MAX_PARTS: u64 = 10_000;

/// S3 maximum object size (5TB)
pub const S3_MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// Maximum concurrent part uploads
pub const MAX_PART_CONCURRENCY: usize = 4;

// Timeout and retry constants
/// Per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Maximum upload attempts per request
pub const MAX_UPLOAD_RETRIES: usize = 3;

/// Base retry delay in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 250;

/// Maximum retry delay in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 30;

/// Extra attempts granted to CompleteMultipartUpload after a transient failure
pub const COMPLETE_RETRIES: usize = 1;

// Environment variable overrides
pub const ENV_ACCOUNT_ID: &str = "SITE_BACKUP_ACCOUNT_ID";
pub const ENV_ACCESS_KEY: &str = "SITE_BACKUP_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "SITE_BACKUP_SECRET_KEY";
pub const ENV_BUCKET: &str = "SITE_BACKUP_BUCKET";
pub const ENV_ENDPOINT: &str = "SITE_BACKUP_ENDPOINT";

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "site-backup.yaml";
