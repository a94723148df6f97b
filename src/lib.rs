//! # site-backup
//!
//! Archives a site's file tree into one ZIP artifact and uploads it to an
//! S3-compatible object store (Cloudflare R2 by default).
//!
//! ## Overview
//!
//! One run is a single pipeline: archive, upload, clean up, report. The
//! archive is streamed to a temporary file, sent either as one PUT or as a
//! multipart upload with bounded retries, and deleted again on every exit
//! path. The result is an [`models::Outcome`] naming the stage that failed,
//! if any.
//!
//! ## Usage
//!
//! ```no_run
//! use site_backup::config::Settings;
//! use site_backup::models::{BackupJob, Credentials};
//! use site_backup::pipeline;
//!
//! # async fn example() {
//! let settings = Settings::default();
//! let credentials = Credentials::new("account-id", "access-key", "secret-key", "backups");
//! let job = BackupJob::new("/var/www/site", credentials).with_key_prefix(Some("nightly".into()));
//!
//! let outcome = pipeline::run_backup(&job, &settings).await;
//! println!("{}", outcome.message());
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`archive`]: directory walk, exclusion rules and ZIP writing
//! - [`cloud`]: object store client, upload planning, multipart sessions and retries
//! - [`lifecycle`]: temporary artifact naming and guaranteed cleanup
//! - [`pipeline`]: the end-to-end backup run
//! - [`config`]: YAML settings with environment overrides
//! - [`models`]: jobs, artifacts, credentials and outcomes
//! - [`error`]: typed errors for each stage
//! - [`security`]: credential scrubbing for logs and messages
//! - [`cli`]: command-line interface definitions
//! - [`constants`]: defaults and protocol limits

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models and structures used throughout the application
pub mod models;

/// Error types for the archive and upload stages
pub mod error;

/// Archive creation from a directory tree
pub mod archive;

/// Object storage upload (S3 API, Cloudflare R2)
pub mod cloud;

/// Settings file handling
pub mod config;

/// Temporary artifact lifecycle
pub mod lifecycle;

/// End-to-end backup pipeline
pub mod pipeline;

/// Utility functions for hashing
pub mod utils;

/// Application constants and configuration values
pub mod constants;

/// Security utilities for credential protection
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
