use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime as ChronoDateTime, Datelike, Timelike, Utc};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime};

use crate::constants::{COMPRESSED_EXTENSIONS, LARGE_FILE_COMPRESSION_THRESHOLD, ZIP64_ENTRY_THRESHOLD};

/// Pick ZIP options for one file.
///
/// Already-compressed formats are stored as-is, very large files get the
/// fastest deflate level, everything else uses the default level. Entry
/// timestamps and permissions are taken from the source metadata.
pub fn compression_options(path: &Path, metadata: &Metadata) -> FileOptions {
    let size = metadata.len();

    let already_compressed = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => COMPRESSED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    };

    let options = if already_compressed {
        FileOptions::default().compression_method(CompressionMethod::Stored)
    } else if size > LARGE_FILE_COMPRESSION_THRESHOLD {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(1))
    } else {
        FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(6))
    };

    let options = options
        .large_file(size >= ZIP64_ENTRY_THRESHOLD)
        .unix_permissions(permissions(metadata));

    match metadata.modified().ok().and_then(zip_time) {
        Some(time) => options.last_modified_time(time),
        None => options,
    }
}

/// Options for directory entries.
pub fn directory_options(metadata: Option<&Metadata>) -> FileOptions {
    let options = FileOptions::default().unix_permissions(0o755);
    match metadata.and_then(|m| m.modified().ok()).and_then(zip_time) {
        Some(time) => options.last_modified_time(time),
        None => options,
    }
}

#[cfg(unix)]
fn permissions(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permissions(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Convert a file time to a ZIP timestamp; ZIP cannot represent dates before 1980.
fn zip_time(time: SystemTime) -> Option<DateTime> {
    let time: ChronoDateTime<Utc> = time.into();
    let year = u16::try_from(time.year()).ok()?;
    DateTime::from_date_and_time(
        year,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .ok()
}
