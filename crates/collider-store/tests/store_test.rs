//! Integration tests for the result store through the `ResultStore` trait.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeDelta, TimeZone, Utc};
use collider_model::{BatchMetadata, ExecutionState, NewSubtaskResult, ResultPlacement, SubtaskStatus};
use collider_store::{InMemoryStore, ManualClock, ResultQuery, ResultStore, SystemClock, snapshot};
use futures::future::join_all;

fn partial(id: &str) -> NewSubtaskResult {
  NewSubtaskResult::new(id, "LocalTextAgent", SubtaskStatus::Completed)
    .with_content(format!("output of {id}"))
    .with_execution_time(10)
}

/// Store a three-step chain a -> b -> c in workflow `w1`.
async fn save_chain(store: &dyn ResultStore) {
  let steps: [(&str, &[&str], &[&str], u32); 3] = [
    ("a", &[], &["b"], 0),
    ("b", &["a"], &["c"], 1),
    ("c", &["a", "b"], &[], 2),
  ];

  for (id, chain, children, level) in steps {
    let placement = ResultPlacement::new("w1", format!("batch-{level}"), 0)
      .with_dependency_chain(chain.iter().copied())
      .with_parents(chain.last().copied())
      .with_children(children.iter().copied())
      .with_level(level);
    let result = store.create_result(partial(id), placement).await.unwrap();
    store.save_result(result).await.unwrap();
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_assigns_unique_contiguous_orders() {
  const TASKS: u64 = 64;
  let store: Arc<dyn ResultStore> = Arc::new(InMemoryStore::new());

  let handles = (0..TASKS).map(|i| {
    let store = store.clone();
    tokio::spawn(async move {
      let result = store
        .create_result(
          partial(&format!("s{i}")),
          ResultPlacement::new(format!("w{}", i % 4), "b1", i as u32),
        )
        .await
        .unwrap();
      let order = result.execution_order;
      store.save_result(result).await.unwrap();
      order
    })
  });

  let orders: Vec<u64> = join_all(handles)
    .await
    .into_iter()
    .map(|joined| joined.unwrap())
    .collect();

  let unique: HashSet<u64> = orders.iter().copied().collect();
  assert_eq!(unique.len(), TASKS as usize);
  assert_eq!(unique, (1..=TASKS).collect::<HashSet<_>>());

  let all = store.query(&ResultQuery::new()).await.unwrap();
  assert_eq!(all.len(), TASKS as usize);
  assert!(all.windows(2).all(|w| w[0].execution_order < w[1].execution_order));
}

#[tokio::test]
async fn test_trait_object_lifecycle() {
  let store: Arc<dyn ResultStore> = Arc::new(InMemoryStore::new());
  save_chain(store.as_ref()).await;

  store.update_status("b", SubtaskStatus::Failed).await.unwrap();
  store.update_status("missing", SubtaskStatus::Failed).await.unwrap();

  let failed = store
    .query(&ResultQuery::new().workflow("w1").status(SubtaskStatus::Failed))
    .await
    .unwrap();
  assert_eq!(failed.len(), 1);
  assert_eq!(failed[0].subtask_id, "b");

  store
    .save_batch_metadata(BatchMetadata::new("batch-0", "running", Utc::now()))
    .await
    .unwrap();
  store
    .update_batch_status("batch-0", "completed")
    .await
    .unwrap();
  let batch = store.get_batch_metadata("batch-0").await.unwrap().unwrap();
  assert!(batch.end_time.is_some());

  store
    .save_execution_state(ExecutionState::new("w1", Utc::now()))
    .await
    .unwrap();
  assert!(store.load_execution_state("w1").await.unwrap().is_some());

  let data = store.get_reintegration_data("w1").await.unwrap();
  assert_eq!(data.execution_order, ["a", "b", "c"]);
  assert_eq!(data.execution_summary.completed, 2);
  assert_eq!(data.execution_summary.failed, 1);
  assert_eq!(data.batch_metadata.len(), 1);
  assert_eq!(data.dependency_graph[2].dependencies, ["b"]);
  assert_eq!(data.dependency_graph[0].dependents, ["b"]);

  assert!(store.validate_integrity("w1").await.unwrap());
}

#[tokio::test]
async fn test_snapshot_file_round_trip() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("snapshot.json");

  let store = InMemoryStore::new();
  save_chain(&store).await;
  snapshot::write_atomic(&path, &store.snapshot()).unwrap();

  let restored = InMemoryStore::from_snapshot(snapshot::read(&path).unwrap(), Arc::new(SystemClock)).unwrap();

  assert_eq!(restored.workflow_subtask_ids("w1"), ["a", "b", "c"]);
  assert!(restored.validate_integrity("w1"));
  for id in ["a", "b", "c"] {
    assert_eq!(restored.get_result(id), store.get_result(id));
  }

  let next = restored
    .create_result(partial("d"), ResultPlacement::new("w1", "batch-3", 0))
    .unwrap();
  assert_eq!(next.execution_order, 4);
}

#[tokio::test]
async fn test_tampered_snapshot_fails_integrity() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("snapshot.json");

  let store = InMemoryStore::new();
  save_chain(&store).await;
  snapshot::write_atomic(&path, &store.snapshot()).unwrap();

  let text = std::fs::read_to_string(&path).unwrap();
  std::fs::write(&path, text.replace("output of b", "forged output")).unwrap();

  let restored = InMemoryStore::from_snapshot(snapshot::read(&path).unwrap(), Arc::new(SystemClock)).unwrap();
  assert!(!restored.validate_integrity("w1"));
  assert_eq!(restored.integrity_report("w1").len(), 1);
}

#[tokio::test]
async fn test_cleanup_keeps_index_and_queries_consistent() {
  let start = Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap();
  let clock = Arc::new(ManualClock::new(start));
  let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
  let dyn_store: Arc<dyn ResultStore> = store.clone();

  for (i, id) in ["r1", "r2", "r3"].into_iter().enumerate() {
    clock.set(start + TimeDelta::minutes(i as i64 + 1));
    let result = dyn_store
      .create_result(partial(id), ResultPlacement::new("w1", "b1", i as u32))
      .await
      .unwrap();
    dyn_store.save_result(result).await.unwrap();
  }

  let removed = dyn_store
    .cleanup(start + TimeDelta::minutes(2))
    .await
    .unwrap();
  assert_eq!(removed, 1);

  assert_eq!(store.workflow_subtask_ids("w1"), ["r2", "r3"]);
  let remaining = dyn_store
    .query(&ResultQuery::new().workflow("w1"))
    .await
    .unwrap();
  let ids: Vec<&str> = remaining.iter().map(|r| r.subtask_id.as_str()).collect();
  assert_eq!(ids, ["r2", "r3"]);
  assert!(dyn_store.get_result("r1").await.unwrap().is_none());
}
