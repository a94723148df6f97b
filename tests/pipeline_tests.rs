//! End-to-end tests of the backup pipeline against an in-memory store.

mod common;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use common::{credentials, dir_entries, test_transfer_config, write_file, Call, RecordingStore, MIB};
use site_backup::archive::Archiver;
use site_backup::cloud::{ObjectStore, TransferOrchestrator};
use site_backup::error::{ArchiveError, PipelineError, Stage, UploadError};
use site_backup::models::{Artifact, BackupJob, Outcome};
use site_backup::pipeline::PipelineController;

fn controller(store: &Arc<RecordingStore>, staging: &TempDir) -> PipelineController {
    let store: Arc<dyn ObjectStore> = store.clone();
    PipelineController::new(store, Archiver::new(staging.path()), test_transfer_config())
}

#[tokio::test]
async fn test_small_site_is_sent_in_one_put() {
    let site = TempDir::new().unwrap();
    write_file(&site.path().join("index.html"), MIB);
    write_file(&site.path().join("assets/style.css"), MIB / 2);
    write_file(&site.path().join("assets/logo.jpg"), MIB / 2);
    let staging = TempDir::new().unwrap();

    let store = Arc::new(RecordingStore::new());
    let job = BackupJob::new(site.path(), credentials());
    let outcome = controller(&store, &staging).run_backup(&job).await;

    let (location, key, size_bytes, sha256) = match outcome {
        Outcome::Success {
            remote_location,
            key,
            size_bytes,
            sha256,
        } => (remote_location, key, size_bytes, sha256),
        other => panic!("expected success, got {:?}", other),
    };

    assert!(location.contains("site-bucket"));
    assert!(location.contains(&key));
    assert_eq!(store.count(|c| matches!(c, Call::Put { .. })), 1);
    assert_eq!(store.count(|c| !matches!(c, Call::Put { .. })), 0);

    let object = store.object("site-bucket", &key).unwrap();
    assert_eq!(object.len() as u64, size_bytes);
    assert_eq!(hex(&Sha256::digest(&object)), sha256);
    assert_eq!(dir_entries(staging.path()), 0);
}

#[tokio::test]
async fn test_failed_single_put_is_not_resent() {
    let site = TempDir::new().unwrap();
    write_file(&site.path().join("index.html"), MIB);
    let staging = TempDir::new().unwrap();

    let store = Arc::new(RecordingStore::new());
    store.fail_put(usize::MAX);

    let outcome = controller(&store, &staging)
        .run_backup(&BackupJob::new(site.path(), credentials()))
        .await;

    match outcome {
        Outcome::Failure {
            stage: Stage::Upload,
            error: PipelineError::Upload(UploadError::UploadFailed { part_number, attempts, .. }),
        } => {
            assert_eq!(part_number, 1);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected UploadFailed, got {:?}", other),
    }
    assert_eq!(store.count(|c| matches!(c, Call::Put { .. })), 1);
    assert_eq!(store.object_count(), 0);
    assert_eq!(dir_entries(staging.path()), 0);
}

#[tokio::test]
async fn test_large_site_is_sent_in_three_parts() {
    let site = TempDir::new().unwrap();
    // Already-compressed extensions are stored, so the archive stays above 12 MiB
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_file(&site.path().join("media").join(name), 4 * MIB);
    }
    let staging = TempDir::new().unwrap();

    let store = Arc::new(RecordingStore::new());
    let job = BackupJob::new(site.path(), credentials()).with_key_prefix(Some("nightly".into()));
    let outcome = controller(&store, &staging).run_backup(&job).await;

    let (key, size_bytes, sha256) = match outcome {
        Outcome::Success {
            key,
            size_bytes,
            sha256,
            ..
        } => (key, size_bytes, sha256),
        other => panic!("expected success, got {:?}", other),
    };
    assert!(key.starts_with("nightly/site-backup-"));

    let parts: Vec<(i64, usize)> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::UploadPart { part_number, len } => Some((part_number, len)),
            _ => None,
        })
        .collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts.iter().map(|(_, len)| *len as u64).sum::<u64>(), size_bytes);

    let completes: Vec<Call> = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Complete { .. }))
        .collect();
    assert_eq!(completes, vec![Call::Complete { part_numbers: vec![1, 2, 3] }]);

    let object = store.object("site-bucket", &key).unwrap();
    assert_eq!(hex(&Sha256::digest(&object)), sha256);
    assert_eq!(store.count(|c| matches!(c, Call::Put { .. })), 0);
    assert_eq!(dir_entries(staging.path()), 0);
}

#[tokio::test]
async fn test_twelve_mib_artifact_splits_five_five_two() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("site-backup-host-20240101-000000-0000abcd.zip");
    write_file(&path, 12 * MIB);
    let artifact = Artifact {
        path,
        size_bytes: 12 * MIB,
        sha256: String::new(),
        entries: 0,
        skipped: 0,
    };

    let store = Arc::new(RecordingStore::new());
    let orchestrator = TransferOrchestrator::new(store.clone(), test_transfer_config());
    let result = orchestrator.upload(&artifact, &credentials(), None).await.unwrap();

    assert_eq!(result.parts, 3);
    let mut parts: Vec<(i64, usize)> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::UploadPart { part_number, len } => Some((part_number, len)),
            _ => None,
        })
        .collect();
    parts.sort();
    assert_eq!(
        parts,
        vec![(1, 5 * MIB as usize), (2, 5 * MIB as usize), (3, 2 * MIB as usize)]
    );
    assert_eq!(
        store.count(|c| matches!(c, Call::Complete { part_numbers } if part_numbers == &vec![1, 2, 3])),
        1
    );
    assert_eq!(store.object("site-bucket", &result.key).unwrap().len() as u64, 12 * MIB);
}

#[tokio::test]
async fn test_exhausted_part_aborts_and_cleans_up() {
    let site = TempDir::new().unwrap();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_file(&site.path().join(name), 4 * MIB);
    }
    let staging = TempDir::new().unwrap();

    let store = Arc::new(RecordingStore::new());
    store.fail_part(2, 4);

    let job = BackupJob::new(site.path(), credentials());
    let outcome = controller(&store, &staging).run_backup(&job).await;

    match outcome {
        Outcome::Failure { stage, error } => {
            assert_eq!(stage, Stage::Upload);
            match error {
                PipelineError::Upload(UploadError::UploadFailed {
                    part_number,
                    attempts,
                    ..
                }) => {
                    assert_eq!(part_number, 2);
                    assert_eq!(attempts, 3);
                }
                other => panic!("expected UploadFailed, got {:?}", other),
            }
        }
        other => panic!("expected failure, got {:?}", other),
    }

    assert_eq!(
        store.count(|c| matches!(c, Call::UploadPart { part_number: 2, .. })),
        3
    );
    assert_eq!(store.count(|c| matches!(c, Call::Abort { .. })), 1);
    assert_eq!(store.count(|c| matches!(c, Call::Complete { .. })), 0);
    assert_eq!(store.open_uploads(), 0);
    assert_eq!(store.object_count(), 0);
    assert_eq!(dir_entries(staging.path()), 0);
}

#[tokio::test]
async fn test_part_recovering_within_bound_succeeds() {
    let site = TempDir::new().unwrap();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write_file(&site.path().join(name), 4 * MIB);
    }
    let staging = TempDir::new().unwrap();

    let store = Arc::new(RecordingStore::new());
    store.fail_part(2, 2);

    let outcome = controller(&store, &staging)
        .run_backup(&BackupJob::new(site.path(), credentials()))
        .await;

    assert!(outcome.is_success(), "{}", outcome.message());
    assert_eq!(store.count(|c| matches!(c, Call::Abort { .. })), 0);
    assert_eq!(dir_entries(staging.path()), 0);
}

#[tokio::test]
async fn test_missing_root_fails_archive_stage_without_upload() {
    let staging = TempDir::new().unwrap();
    let missing = staging.path().join("does-not-exist");
    let artifacts = staging.path().join("artifacts");

    let store = Arc::new(RecordingStore::new());
    let store_handle: Arc<dyn ObjectStore> = store.clone();
    let controller = PipelineController::new(store_handle, Archiver::new(&artifacts), test_transfer_config());

    let outcome = controller.run_backup(&BackupJob::new(&missing, credentials())).await;

    match &outcome {
        Outcome::Failure {
            stage: Stage::Archive,
            error: PipelineError::Archive(ArchiveError::Io { .. }),
        } => {}
        other => panic!("expected archive I/O failure, got {:?}", other),
    }
    assert!(outcome.message().starts_with("Backup failed:"));
    assert!(store.calls().is_empty());
    assert_eq!(dir_entries(&artifacts), 0);
}

#[tokio::test]
async fn test_invalid_exclude_pattern_fails_archive_stage() {
    let site = TempDir::new().unwrap();
    write_file(&site.path().join("index.html"), 1024);
    let staging = TempDir::new().unwrap();

    let store = Arc::new(RecordingStore::new());
    let job = BackupJob::new(site.path(), credentials()).with_excludes(["(unclosed"]);
    let outcome = controller(&store, &staging).run_backup(&job).await;

    assert!(matches!(
        outcome,
        Outcome::Failure {
            stage: Stage::Archive,
            error: PipelineError::Archive(ArchiveError::InvalidPattern(_))
        }
    ));
    assert!(store.calls().is_empty());
    assert_eq!(dir_entries(staging.path()), 0);
}

#[tokio::test]
async fn test_abort_is_idempotent() {
    let store = RecordingStore::new();
    let upload_id = store.create_multipart_upload("site-bucket", "k").await.unwrap();

    store.abort_multipart_upload("site-bucket", "k", &upload_id).await.unwrap();
    store.abort_multipart_upload("site-bucket", "k", &upload_id).await.unwrap();
    assert_eq!(store.aborted(), 1);
}

#[tokio::test]
async fn test_consecutive_runs_use_distinct_keys() {
    let site = TempDir::new().unwrap();
    write_file(&site.path().join("index.html"), 1024);
    let staging = TempDir::new().unwrap();

    let store = Arc::new(RecordingStore::new());
    let controller = controller(&store, &staging);
    let job = BackupJob::new(site.path(), credentials());

    let first = controller.run_backup(&job).await;
    let second = controller.run_backup(&job).await;
    match (first, second) {
        (Outcome::Success { key: a, .. }, Outcome::Success { key: b, .. }) => assert_ne!(a, b),
        other => panic!("expected two successes, got {:?}", other),
    }
    assert_eq!(store.object_count(), 2);
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
