//! Small helpers shared by the archiver and the transfer layer.
//!
//! ```no_run
//! use site_backup::utils::hash::sha256_file;
//! use std::path::Path;
//!
//! # fn example() -> std::io::Result<()> {
//! let digest = sha256_file(Path::new("/tmp/site-backup.zip"))?;
//! println!("SHA-256: {}", digest);
//! # Ok(())
//! # }
//! ```

/// Content digests for artifacts and request bodies
pub mod hash;
