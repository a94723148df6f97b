//! Test utilities for site_backup
//!
//! Helpers for building file trees and artifacts in unit tests.

#![cfg(test)]

use anyhow::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a temporary file with the given content
pub fn create_temp_file(content: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

/// Creates a small site tree in a temporary directory
pub fn create_test_file_structure() -> Result<TempDir> {
    let temp_dir = create_temp_dir()?;
    let base_path = temp_dir.path();

    fs::create_dir_all(base_path.join("dir1/subdir1"))?;
    fs::create_dir_all(base_path.join("dir2"))?;

    fs::write(base_path.join("file1.txt"), b"Test content 1")?;
    fs::write(base_path.join("file2.log"), b"Test log content")?;
    fs::write(base_path.join("dir1/file3.txt"), b"Test content 3")?;
    fs::write(base_path.join("dir1/subdir1/file4.txt"), b"Test content 4")?;
    fs::write(base_path.join("dir2/file5.log"), b"Another log file")?;

    Ok(temp_dir)
}

/// Writes `size` bytes of a repeating pattern to `path`
pub fn write_sized_file(path: &Path, size: u64) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let block: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();

    let mut remaining = size;
    while remaining > 0 {
        let len = remaining.min(block.len() as u64) as usize;
        writer.write_all(&block[..len])?;
        remaining -= len as u64;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_file_structure() {
        let dir = create_test_file_structure().unwrap();
        assert!(dir.path().join("file1.txt").exists());
        assert!(dir.path().join("dir1/subdir1/file4.txt").exists());
        assert!(dir.path().join("dir2/file5.log").exists());
    }

    #[test]
    fn test_write_sized_file() {
        let dir = create_temp_dir().unwrap();
        let path = dir.path().join("sized.bin");
        write_sized_file(&path, 100_000).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 100_000);
    }
}
