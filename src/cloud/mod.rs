//! Object storage transfer for backup artifacts.
//!
//! Artifacts are sent to an S3-compatible store (Cloudflare R2 by default)
//! either in one PUT or as a multipart upload, depending on size.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────┐
//! │ TransferOrchestrator │────▶│  UploadPlan  │
//! └──────────┬───────────┘     └──────────────┘
//!            │
//!            ├──── single PUT ─────────────┐
//!            │                             │
//!     ┌──────▼────────┐            ┌───────▼───────┐
//!     │ UploadSession │───────────▶│  ObjectStore  │
//!     │ (multipart)   │            │ (R2ObjectStore)│
//!     └───────────────┘            └───────────────┘
//! ```
//!
//! The [`ObjectStore`] trait is the seam between transfer logic and the
//! wire: [`R2ObjectStore`] talks to the real service through `rusoto_s3`,
//! tests substitute a mock or an in-memory store.
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use site_backup::cloud::{R2ObjectStore, TransferConfig, TransferOrchestrator};
//! use site_backup::models::{Artifact, Credentials};
//!
//! # async fn example(artifact: Artifact) -> Result<(), site_backup::error::UploadError> {
//! let credentials = Credentials::new("account", "access", "secret", "bucket");
//! let store = Arc::new(R2ObjectStore::new(&credentials)?);
//! let orchestrator = TransferOrchestrator::new(store, TransferConfig::default());
//! let result = orchestrator.upload(&artifact, &credentials, Some("nightly")).await?;
//! println!("uploaded to {}", result.location);
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod client;
pub mod plan;
pub mod session;
pub mod store;
pub mod transfer;

pub use client::R2ObjectStore;
pub use plan::{PartRange, UploadPlan};
pub use session::{SessionState, UploadSession};
pub use store::{validate_manifest, ObjectStore};
pub use transfer::{object_key, RetryPolicy, TransferConfig, TransferOrchestrator};
