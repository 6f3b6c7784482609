//! Point-in-time copies of an [`InMemoryStore`](crate::InMemoryStore).
//!
//! A snapshot is plain JSON. Results keep their stored checksums, so a file
//! edited or damaged on disk fails integrity validation after restore.

use std::fs;
use std::io::Write;
use std::path::Path;

use collider_model::{BatchMetadata, ExecutionState, SubtaskResult};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::Error;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
  pub version: u32,
  /// Execution order the restored store hands out next.
  pub next_execution_order: u64,
  /// Results in the order they were first stored.
  pub results: Vec<SubtaskResult>,
  #[serde(default)]
  pub execution_states: Vec<ExecutionState>,
  #[serde(default)]
  pub batches: Vec<BatchMetadata>,
}

/// Read a snapshot file.
pub fn read(path: impl AsRef<Path>) -> Result<StoreSnapshot, Error> {
  let path = path.as_ref();
  let bytes = fs::read(path)?;
  let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)?;
  debug!(path = %path.display(), results = snapshot.results.len(), "read snapshot");
  Ok(snapshot)
}

/// Write a snapshot so that `path` holds either the old or the new contents,
/// never a partial file.
///
/// Each call stages its bytes in a uniquely named file beside `path`, so
/// concurrent writers never share a temporary file; the last rename wins.
/// Creates missing parent directories.
pub fn write_atomic(path: impl AsRef<Path>, snapshot: &StoreSnapshot) -> Result<(), Error> {
  let path = path.as_ref();
  let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
    Some(parent) => parent,
    None => Path::new("."),
  };
  fs::create_dir_all(dir)?;

  let bytes = serde_json::to_vec_pretty(snapshot)?;
  let mut staged = NamedTempFile::new_in(dir)?;
  staged.write_all(&bytes)?;
  staged.as_file().sync_all()?;
  staged.persist(path).map_err(|e| e.error)?;

  debug!(path = %path.display(), results = snapshot.results.len(), "wrote snapshot");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::InMemoryStore;
  use chrono::Utc;
  use collider_model::{NewSubtaskResult, ResultPlacement, SubtaskStatus};

  fn sample() -> StoreSnapshot {
    let store = InMemoryStore::new();
    let result = store
      .create_result(
        NewSubtaskResult::new("s1", "agent", SubtaskStatus::Completed).with_content("done"),
        ResultPlacement::new("w1", "b1", 0),
      )
      .unwrap();
    store.save_result(result).unwrap();
    store
      .save_batch_metadata(BatchMetadata::new("b1", "completed", Utc::now()))
      .unwrap();
    store.snapshot()
  }

  #[test]
  fn test_write_then_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("snapshot.json");
    let snapshot = sample();

    write_atomic(&path, &snapshot).unwrap();

    assert_eq!(read(&path).unwrap(), snapshot);
    let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
      .unwrap()
      .map(|entry| entry.unwrap().file_name())
      .collect();
    assert_eq!(entries, ["snapshot.json"]);
  }

  #[test]
  fn test_concurrent_writers_leave_a_whole_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let full = sample();
    let empty = InMemoryStore::new().snapshot();

    std::thread::scope(|scope| {
      for i in 0..8 {
        let snapshot = if i % 2 == 0 { &full } else { &empty };
        let path = &path;
        scope.spawn(move || {
          for _ in 0..10 {
            write_atomic(path, snapshot).unwrap();
          }
        });
      }
    });

    let written = read(&path).unwrap();
    assert!(written == full || written == empty);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
  }

  #[test]
  fn test_overwrite_replaces_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    write_atomic(&path, &sample()).unwrap();
    let empty = InMemoryStore::new().snapshot();
    write_atomic(&path, &empty).unwrap();

    assert!(read(&path).unwrap().results.is_empty());
  }

  #[test]
  fn test_read_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
  }

  #[test]
  fn test_read_garbage_is_snapshot_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    fs::write(&path, "{ not json").unwrap();

    assert!(matches!(read(&path).unwrap_err(), Error::Snapshot(_)));
  }

  #[test]
  fn test_camel_case_layout() {
    let value = serde_json::to_value(sample()).unwrap();
    assert_eq!(value["version"], SNAPSHOT_VERSION);
    assert_eq!(value["nextExecutionOrder"], 2);
    assert_eq!(value["results"][0]["subtaskId"], "s1");
    assert_eq!(value["batches"][0]["batchId"], "b1");
  }
}
