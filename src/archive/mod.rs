//! Archive construction.
//!
//! The archiver walks the backup root in sorted order and streams every
//! regular file into a single ZIP artifact under the configured temp
//! directory. Memory use is bounded by the copy buffer, not by the tree.
//!
//! ```no_run
//! use site_backup::archive::Archiver;
//! use site_backup::constants::DEFAULT_EXCLUDE_PATTERNS;
//! use std::path::Path;
//!
//! # fn example() -> Result<(), site_backup::error::ArchiveError> {
//! let archiver = Archiver::new(std::env::temp_dir());
//! let artifact = archiver.create_backup(Path::new("/srv/www"), DEFAULT_EXCLUDE_PATTERNS)?;
//! println!("{} ({} bytes)", artifact.path().display(), artifact.artifact().size_bytes);
//! artifact.cleanup_backup();
//! # Ok(())
//! # }
//! ```

/// Tree walk and ZIP streaming
pub mod archiver;

/// Per-file ZIP options
pub mod compression;

/// Path exclusion rules
pub mod exclude;

pub use archiver::{ArchiveLimits, Archiver};
pub use exclude::{normalize_entry_name, ExcludeRules};
