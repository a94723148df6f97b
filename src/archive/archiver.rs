use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipWriter;

use crate::archive::compression::{compression_options, directory_options};
use crate::archive::exclude::{normalize_entry_name, ExcludeRules};
use crate::constants::{ARCHIVE_COPY_BUFFER_SIZE, ARTIFACT_EXTENSION, DEFAULT_ARTIFACT_PREFIX};
use crate::error::ArchiveError;
use crate::lifecycle::{PendingArtifact, TempArtifact};
use crate::utils::hash::sha256_file;

/// Resource limits for one archive run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveLimits {
    /// Files larger than this are skipped with a warning.
    pub max_file_size: Option<u64>,
    /// Total input bytes allowed before the run fails.
    pub max_total_size: Option<u64>,
    /// Wall-clock budget for the whole walk.
    pub max_duration: Option<Duration>,
}

/// Wall-clock budget checked between entries and between copy buffers.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    start: Instant,
    max: Option<Duration>,
}

impl Deadline {
    fn new(max: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            max,
        }
    }

    fn check(&self) -> Result<(), ArchiveError> {
        match self.max {
            Some(max) if self.start.elapsed() > max => Err(ArchiveError::LimitExceeded(format!(
                "archiving took longer than {:?}",
                max
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct ArchiveStats {
    entries: usize,
    directories: usize,
    skipped: usize,
    input_bytes: u64,
}

/// Builds one ZIP artifact from a directory tree.
#[derive(Debug, Clone)]
pub struct Archiver {
    temp_dir: PathBuf,
    artifact_prefix: String,
    limits: ArchiveLimits,
}

impl Archiver {
    /// Create an archiver writing artifacts under `temp_dir`.
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
            limits: ArchiveLimits::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.artifact_prefix = prefix.to_string();
        self
    }

    pub fn with_limits(mut self, limits: ArchiveLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Archive everything under `root` that no exclude pattern matches.
    ///
    /// Files are streamed into the archive one at a time through a fixed
    /// buffer. Inaccessible subpaths are logged and skipped; an unreadable
    /// root, a full disk or an exceeded limit fails the run. No file is
    /// created when the root check fails, and a partially written archive is
    /// removed before the error is returned.
    pub fn create_backup<S: AsRef<str>>(
        &self,
        root: &Path,
        exclude_patterns: &[S],
    ) -> Result<TempArtifact, ArchiveError> {
        let deadline = Deadline::new(self.limits.max_duration);
        let own_artifacts = own_artifact_pattern(&self.artifact_prefix);
        let mut patterns: Vec<&str> = exclude_patterns.iter().map(|p| p.as_ref()).collect();
        patterns.push(own_artifacts.as_str());
        let rules = ExcludeRules::new(patterns.as_slice())?;
        let root = check_root(root)?;

        info!("Archiving {} ({} exclude patterns)", root.display(), rules.pattern_count());

        let (pending, file) = PendingArtifact::create(&self.temp_dir, &self.artifact_prefix)
            .map_err(|e| ArchiveError::from_io(&self.temp_dir, e))?;

        // Never archive our own output
        let rules = match fs::canonicalize(&self.temp_dir) {
            Ok(dir) if dir.starts_with(&root) => {
                debug!("Excluding artifact directory {}", dir.display());
                rules.exclude_dir(dir)
            }
            _ => rules,
        };

        let mut zip = ZipWriter::new(BufWriter::new(file));
        let mut stats = ArchiveStats::default();
        let mut buffer = vec![0u8; ARCHIVE_COPY_BUFFER_SIZE];
        let mut excluded = 0usize;

        let walker = WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let name = entry_name(&root, entry.path());
                if rules.is_excluded(entry.path(), &name) {
                    debug!("Skipping excluded path: {}", entry.path().display());
                    excluded += 1;
                    false
                } else {
                    true
                }
            });

        for entry in walker {
            deadline.check()?;

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                    if err.depth() == 0 {
                        let source = err
                            .into_io_error()
                            .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk failed"));
                        return Err(ArchiveError::from_io(path, source));
                    }
                    warn!("Skipping inaccessible path {}: {}", path.display(), err);
                    stats.skipped += 1;
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let name = entry_name(&root, entry.path());
            let file_type = entry.file_type();

            if file_type.is_dir() {
                let metadata = entry.metadata().ok();
                zip.add_directory(format!("{}/", name), directory_options(metadata.as_ref()))
                    .map_err(|e| ArchiveError::from_zip(pending.path(), e))?;
                stats.directories += 1;
                continue;
            }

            if !file_type.is_file() {
                debug!("Skipping non-regular file: {}", entry.path().display());
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    stats.skipped += 1;
                    continue;
                }
            };
            let size = metadata.len();

            if let Some(max) = self.limits.max_file_size {
                if size > max {
                    warn!(
                        "Skipping {} ({} bytes exceeds per-file limit of {} bytes)",
                        entry.path().display(),
                        size,
                        max
                    );
                    stats.skipped += 1;
                    continue;
                }
            }

            if let Some(max) = self.limits.max_total_size {
                if stats.input_bytes + size > max {
                    return Err(ArchiveError::LimitExceeded(format!(
                        "input exceeds {} bytes at {}",
                        max, name
                    )));
                }
            }

            let mut source = match File::open(entry.path()) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    stats.skipped += 1;
                    continue;
                }
            };

            zip.start_file(name.as_str(), compression_options(entry.path(), &metadata))
                .map_err(|e| ArchiveError::from_zip(pending.path(), e))?;

            let copied = copy_entry(
                &mut source,
                &mut zip,
                &mut buffer,
                entry.path(),
                pending.path(),
                &deadline,
            )?;

            stats.entries += 1;
            stats.input_bytes += copied;
        }

        let writer = zip
            .finish()
            .map_err(|e| ArchiveError::from_zip(pending.path(), e))?;
        let file = writer
            .into_inner()
            .map_err(|e| ArchiveError::from_io(pending.path(), e.into_error()))?;
        file.sync_all()
            .map_err(|e| ArchiveError::from_io(pending.path(), e))?;
        let size_bytes = file
            .metadata()
            .map_err(|e| ArchiveError::from_io(pending.path(), e))?
            .len();
        drop(file);

        let sha256 = sha256_file(pending.path())
            .map_err(|e| ArchiveError::from_io(pending.path(), e))?;

        info!(
            "Archived {} files and {} directories ({} bytes in, {} bytes out, {} skipped, {} excluded) to {} in {:?}",
            stats.entries,
            stats.directories,
            stats.input_bytes,
            size_bytes,
            stats.skipped,
            excluded,
            pending.path().display(),
            deadline.start.elapsed()
        );

        Ok(pending.complete(size_bytes, sha256, stats.entries, stats.skipped))
    }

}

/// Pattern matching artifacts this archiver names, anywhere under the root.
fn own_artifact_pattern(prefix: &str) -> String {
    format!(r"(^|/){}-[^/]*\.{}$", regex::escape(prefix), ARTIFACT_EXTENSION)
}

/// Validate the backup root and return its canonical form.
fn check_root(root: &Path) -> Result<PathBuf, ArchiveError> {
    let metadata = fs::metadata(root).map_err(|e| ArchiveError::from_io(root, e))?;

    if !metadata.is_dir() {
        return Err(ArchiveError::Io {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::Other, "backup root is not a directory"),
        });
    }

    fs::read_dir(root).map_err(|e| ArchiveError::from_io(root, e))?;
    fs::canonicalize(root).map_err(|e| ArchiveError::from_io(root, e))
}

fn entry_name(root: &Path, path: &Path) -> String {
    normalize_entry_name(path.strip_prefix(root).unwrap_or(path))
}

/// Stream one source file into the open ZIP entry.
///
/// Read failures are attributed to the source file, write failures to the
/// artifact so that a full disk surfaces as `DiskFull`.
fn copy_entry<R: Read, W: Write>(
    source: &mut R,
    sink: &mut W,
    buffer: &mut [u8],
    source_path: &Path,
    artifact_path: &Path,
    deadline: &Deadline,
) -> Result<u64, ArchiveError> {
    let mut copied = 0u64;
    loop {
        deadline.check()?;
        let bytes_read = match source.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ArchiveError::from_io(source_path, e)),
        };
        sink.write_all(&buffer[..bytes_read])
            .map_err(|e| ArchiveError::from_io(artifact_path, e))?;
        copied += bytes_read as u64;
    }
    Ok(copied)
}
