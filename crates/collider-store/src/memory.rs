//! In-memory result store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collider_model::{
  BatchMetadata, ExecutionState, NewSubtaskResult, ResultPlacement, SubtaskResult, SubtaskStatus,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checksum::compute_checksum;
use crate::clock::{Clock, SystemClock};
use crate::index::WorkflowIndex;
use crate::integrity::IntegrityViolation;
use crate::query::ResultQuery;
use crate::reintegration::ReintegrationData;
use crate::retention::CleanupReport;
use crate::snapshot::{SNAPSHOT_VERSION, StoreSnapshot};
use crate::{Error, ResultStore};

/// A stored result and the position it was first inserted at.
#[derive(Debug, Clone)]
pub(crate) struct StoredResult {
  pub(crate) result: SubtaskResult,
  pub(crate) sequence: u64,
}

/// Everything guarded by the store's lock.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
  pub(crate) results: HashMap<String, StoredResult>,
  pub(crate) execution_states: HashMap<String, ExecutionState>,
  pub(crate) batches: HashMap<String, BatchMetadata>,
  pub(crate) index: WorkflowIndex,
  /// Execution order to the subtask stored with it.
  order_owners: HashMap<u64, String>,
  next_sequence: u64,
}

impl Ledger {
  /// Insert or overwrite a result, keeping the index in step.
  fn put_result(&mut self, result: SubtaskResult) {
    let subtask_id = result.subtask_id.clone();
    let workflow_id = result.workflow_id.clone();
    let execution_order = result.execution_order;

    match self.results.get_mut(&subtask_id) {
      Some(stored) => {
        if stored.result.workflow_id != workflow_id {
          self.index.remove(&stored.result.workflow_id, &subtask_id);
          stored.sequence = self.next_sequence;
          self.next_sequence += 1;
        }
        stored.result = result;
      }
      None => {
        self.results.insert(
          subtask_id.clone(),
          StoredResult {
            result,
            sequence: self.next_sequence,
          },
        );
        self.next_sequence += 1;
      }
    }

    self.index.insert(&workflow_id, &subtask_id);
    self.order_owners.insert(execution_order, subtask_id);
  }

  /// Reject a save that would move a stored result to another execution
  /// order or give one order to two subtasks.
  fn check_order(&self, result: &SubtaskResult) -> Result<(), Error> {
    let order = result.execution_order;

    if let Some(stored) = self.get(&result.subtask_id) {
      if stored.execution_order != order {
        return Err(Error::invalid(
          "execution_order",
          format!(
            "subtask {} already holds execution order {}",
            result.subtask_id, stored.execution_order
          ),
        ));
      }
      return Ok(());
    }

    match self.order_owners.get(&order) {
      Some(owner) if *owner != result.subtask_id => Err(Error::invalid(
        "execution_order",
        format!("{order} already belongs to subtask {owner}"),
      )),
      _ => Ok(()),
    }
  }

  /// Stored results in the order they were first inserted.
  pub(crate) fn results_in_insertion_order(&self) -> Vec<&SubtaskResult> {
    let mut stored: Vec<&StoredResult> = self.results.values().collect();
    stored.sort_by_key(|s| s.sequence);
    stored.into_iter().map(|s| &s.result).collect()
  }

  /// Discard the workflow index and order owners and derive them again from
  /// the stored results.
  pub(crate) fn rebuild_index(&mut self) {
    let index = WorkflowIndex::rebuild(
      self
        .results_in_insertion_order()
        .into_iter()
        .map(|r| (r.workflow_id.as_str(), r.subtask_id.as_str())),
    );
    let order_owners = self
      .results
      .values()
      .map(|s| (s.result.execution_order, s.result.subtask_id.clone()))
      .collect();

    self.index = index;
    self.order_owners = order_owners;
  }

  pub(crate) fn get(&self, subtask_id: &str) -> Option<&SubtaskResult> {
    self.results.get(subtask_id).map(|s| &s.result)
  }

  fn workflow_results(&self, workflow_id: &str) -> impl Iterator<Item = &SubtaskResult> {
    self
      .index
      .subtask_ids(workflow_id)
      .iter()
      .filter_map(|id| self.get(id))
  }
}

/// Counts describing the store's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
  pub total_results: usize,
  pub total_workflows: usize,
  pub total_batches: usize,
  pub total_execution_states: usize,
  pub status_counts: BTreeMap<SubtaskStatus, usize>,
  /// Execution order the next created result will receive.
  pub next_execution_order: u64,
}

/// Result store held entirely in process memory.
///
/// One `RwLock` guards the ledger and its workflow index, so every write
/// publishes the result, its checksum and its index entry together. Execution
/// order comes from a separate atomic counter that starts at 1 and only moves
/// forward.
///
/// Nothing survives the process unless a [`StoreSnapshot`] is taken and
/// written out.
pub struct InMemoryStore {
  ledger: RwLock<Ledger>,
  next_order: AtomicU64,
  clock: Arc<dyn Clock>,
}

impl InMemoryStore {
  /// Create an empty store using wall-clock time.
  pub fn new() -> Self {
    Self::with_clock(Arc::new(SystemClock))
  }

  /// Create an empty store that reads time from `clock`.
  pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
    Self {
      ledger: RwLock::new(Ledger::default()),
      next_order: AtomicU64::new(1),
      clock,
    }
  }

  /// Restore a store from a snapshot.
  ///
  /// Results keep their stored timestamps and checksums so corruption in the
  /// snapshot stays detectable. The execution order counter resumes past every
  /// restored value.
  pub fn from_snapshot(snapshot: StoreSnapshot, clock: Arc<dyn Clock>) -> Result<Self, Error> {
    if snapshot.version > SNAPSHOT_VERSION {
      return Err(Error::UnsupportedSnapshot(snapshot.version));
    }

    let highest_order = snapshot
      .results
      .iter()
      .map(|r| r.execution_order)
      .max()
      .unwrap_or(0);

    let mut ledger = Ledger::default();
    for result in snapshot.results {
      ledger.put_result(result);
    }
    ledger.execution_states = snapshot
      .execution_states
      .into_iter()
      .map(|state| (state.workflow_id.clone(), state))
      .collect();
    ledger.batches = snapshot
      .batches
      .into_iter()
      .map(|batch| (batch.batch_id.clone(), batch))
      .collect();

    let next_order = snapshot
      .next_execution_order
      .max(highest_order.saturating_add(1))
      .max(1);

    debug!(
      results = ledger.results.len(),
      next_order, "restored store from snapshot"
    );

    Ok(Self {
      ledger: RwLock::new(ledger),
      next_order: AtomicU64::new(next_order),
      clock,
    })
  }

  /// Capture the store's contents.
  pub fn snapshot(&self) -> StoreSnapshot {
    let ledger = self.read();

    let mut execution_states: Vec<ExecutionState> =
      ledger.execution_states.values().cloned().collect();
    execution_states.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));

    let mut batches: Vec<BatchMetadata> = ledger.batches.values().cloned().collect();
    batches.sort_by(|a, b| a.batch_id.cmp(&b.batch_id));

    StoreSnapshot {
      version: SNAPSHOT_VERSION,
      next_execution_order: self.next_order.load(Ordering::SeqCst),
      results: ledger
        .results_in_insertion_order()
        .into_iter()
        .cloned()
        .collect(),
      execution_states,
      batches,
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, Ledger> {
    self.ledger.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, Ledger> {
    self.ledger.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Build a complete result with the next execution order without storing it.
  pub fn create_result(
    &self,
    partial: NewSubtaskResult,
    placement: ResultPlacement,
  ) -> Result<SubtaskResult, Error> {
    require_id("subtask_id", &partial.subtask_id)?;
    require_id("workflow_id", &placement.workflow_id)?;
    require_id("batch_id", &placement.batch_id)?;

    let execution_order = self.next_order.fetch_add(1, Ordering::SeqCst);

    let mut result = SubtaskResult {
      subtask_id: partial.subtask_id,
      workflow_id: placement.workflow_id,
      batch_id: placement.batch_id,
      batch_index: placement.batch_index,
      agent_id: partial.agent_id,
      status: partial.status,
      execution_time: partial.execution_time,
      retry_count: partial.retry_count,
      result: partial.result,
      dependency_chain: placement.dependency_chain,
      parent_subtask_ids: placement.parent_subtask_ids,
      child_subtask_ids: placement.child_subtask_ids,
      execution_level: placement.execution_level,
      execution_order,
      storage_timestamp: self.clock.now(),
      checksum: String::new(),
    };
    result.checksum = compute_checksum(&result);

    Ok(result)
  }

  /// Store or overwrite a result by subtask id.
  ///
  /// The execution order must be one this store issued. An overwrite must
  /// keep the order already stored, and no two subtasks may share one.
  pub fn save_result(&self, mut result: SubtaskResult) -> Result<(), Error> {
    validate_result(&result)?;

    let issued = self.next_order.load(Ordering::SeqCst);
    if result.execution_order >= issued {
      return Err(Error::invalid(
        "execution_order",
        format!("{} was never issued by this store", result.execution_order),
      ));
    }

    let mut ledger = self.write();
    ledger.check_order(&result)?;
    result.storage_timestamp = self.clock.now();
    result.checksum = compute_checksum(&result);

    debug!(
      subtask_id = %result.subtask_id,
      workflow_id = %result.workflow_id,
      execution_order = result.execution_order,
      status = %result.status,
      "saving result"
    );
    ledger.put_result(result);
    Ok(())
  }

  /// Change a stored result's status. Returns `false` for unknown ids.
  pub fn update_status(&self, subtask_id: &str, status: SubtaskStatus) -> bool {
    let mut ledger = self.write();
    let now = self.clock.now();

    let Some(stored) = ledger.results.get_mut(subtask_id) else {
      debug!(subtask_id, %status, "status update for unknown subtask ignored");
      return false;
    };

    let result = &mut stored.result;
    result.status = status;
    result.storage_timestamp = now;
    result.checksum = compute_checksum(result);
    debug!(subtask_id, %status, "updated subtask status");
    true
  }

  pub fn get_result(&self, subtask_id: &str) -> Option<SubtaskResult> {
    self.read().get(subtask_id).cloned()
  }

  /// Replace a workflow's execution state.
  pub fn save_execution_state(&self, state: ExecutionState) -> Result<(), Error> {
    require_id("workflow_id", &state.workflow_id)?;
    debug!(workflow_id = %state.workflow_id, status = ?state.status, "saving execution state");
    self
      .write()
      .execution_states
      .insert(state.workflow_id.clone(), state);
    Ok(())
  }

  pub fn load_execution_state(&self, workflow_id: &str) -> Option<ExecutionState> {
    self.read().execution_states.get(workflow_id).cloned()
  }

  /// Replace a batch's metadata.
  pub fn save_batch_metadata(&self, metadata: BatchMetadata) -> Result<(), Error> {
    require_id("batch_id", &metadata.batch_id)?;
    debug!(batch_id = %metadata.batch_id, status = %metadata.status, "saving batch metadata");
    self
      .write()
      .batches
      .insert(metadata.batch_id.clone(), metadata);
    Ok(())
  }

  /// Change a batch's status, stamping its end time when the status is
  /// `completed` or `failed`. Returns `false` for unknown ids.
  pub fn update_batch_status(&self, batch_id: &str, status: &str) -> bool {
    let mut ledger = self.write();
    let now = self.clock.now();

    let Some(batch) = ledger.batches.get_mut(batch_id) else {
      debug!(batch_id, status, "status update for unknown batch ignored");
      return false;
    };

    batch.status = status.to_string();
    if BatchMetadata::is_terminal_status(status) {
      batch.end_time = Some(now);
    }
    true
  }

  pub fn get_batch_metadata(&self, batch_id: &str) -> Option<BatchMetadata> {
    self.read().batches.get(batch_id).cloned()
  }

  /// Subtask ids indexed under a workflow, in insertion order.
  pub fn workflow_subtask_ids(&self, workflow_id: &str) -> Vec<String> {
    self.read().index.subtask_ids(workflow_id).to_vec()
  }

  /// Results matching the query, ascending by execution order.
  pub fn query(&self, query: &ResultQuery) -> Vec<SubtaskResult> {
    let ledger = self.read();
    match &query.workflow_id {
      Some(workflow_id) => query.apply(ledger.workflow_results(workflow_id)),
      None => query.apply(ledger.results.values().map(|s| &s.result)),
    }
  }

  /// Assemble a workflow's results, dependency graph, batches and summary.
  pub fn get_reintegration_data(&self, workflow_id: &str) -> ReintegrationData {
    let ledger = self.read();
    let results = ResultQuery::new().apply(ledger.workflow_results(workflow_id));
    ReintegrationData::assemble(workflow_id, results, |batch_id| {
      ledger.batches.get(batch_id).cloned()
    })
  }

  /// Remove entries older than `older_than`, returning the total removed.
  pub fn cleanup(&self, older_than: DateTime<Utc>) -> usize {
    self.cleanup_report(older_than).total()
  }

  /// Remove entries older than `older_than`, reporting removals per kind.
  pub fn cleanup_report(&self, older_than: DateTime<Utc>) -> CleanupReport {
    self.write().remove_older_than(older_than)
  }

  /// Rebuild the workflow index from the stored results.
  pub fn rebuild_index(&self) {
    self.write().rebuild_index();
  }

  /// Every integrity problem found for a workflow's indexed results.
  pub fn integrity_report(&self, workflow_id: &str) -> Vec<IntegrityViolation> {
    self.read().integrity_violations(workflow_id)
  }

  /// Whether a workflow's indexed results are present, unmodified and free of
  /// dangling dependencies.
  pub fn validate_integrity(&self, workflow_id: &str) -> bool {
    self.integrity_report(workflow_id).is_empty()
  }

  pub fn statistics(&self) -> StoreStats {
    let ledger = self.read();

    let mut status_counts = BTreeMap::new();
    for stored in ledger.results.values() {
      *status_counts.entry(stored.result.status).or_insert(0) += 1;
    }

    StoreStats {
      total_results: ledger.results.len(),
      total_workflows: ledger.index.workflow_count(),
      total_batches: ledger.batches.len(),
      total_execution_states: ledger.execution_states.len(),
      status_counts,
      next_execution_order: self.next_order.load(Ordering::SeqCst),
    }
  }

  #[cfg(test)]
  pub(crate) fn with_ledger_mut<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
    let mut ledger = self.write();
    f(&mut *ledger)
  }
}

impl Default for InMemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

fn require_id(field: &'static str, value: &str) -> Result<(), Error> {
  if value.trim().is_empty() {
    return Err(Error::invalid(field, "must not be empty"));
  }
  Ok(())
}

fn validate_result(result: &SubtaskResult) -> Result<(), Error> {
  require_id("subtask_id", &result.subtask_id)?;
  require_id("workflow_id", &result.workflow_id)?;
  require_id("batch_id", &result.batch_id)?;
  if result.execution_order == 0 {
    return Err(Error::invalid(
      "execution_order",
      "not assigned; build results with create_result",
    ));
  }
  Ok(())
}

#[async_trait]
impl ResultStore for InMemoryStore {
  async fn save_result(&self, result: SubtaskResult) -> Result<(), Error> {
    InMemoryStore::save_result(self, result)
  }

  async fn update_status(&self, subtask_id: &str, status: SubtaskStatus) -> Result<(), Error> {
    InMemoryStore::update_status(self, subtask_id, status);
    Ok(())
  }

  async fn get_result(&self, subtask_id: &str) -> Result<Option<SubtaskResult>, Error> {
    Ok(InMemoryStore::get_result(self, subtask_id))
  }

  async fn save_execution_state(&self, state: ExecutionState) -> Result<(), Error> {
    InMemoryStore::save_execution_state(self, state)
  }

  async fn load_execution_state(&self, workflow_id: &str) -> Result<Option<ExecutionState>, Error> {
    Ok(InMemoryStore::load_execution_state(self, workflow_id))
  }

  async fn save_batch_metadata(&self, metadata: BatchMetadata) -> Result<(), Error> {
    InMemoryStore::save_batch_metadata(self, metadata)
  }

  async fn update_batch_status(&self, batch_id: &str, status: &str) -> Result<(), Error> {
    InMemoryStore::update_batch_status(self, batch_id, status);
    Ok(())
  }

  async fn get_batch_metadata(&self, batch_id: &str) -> Result<Option<BatchMetadata>, Error> {
    Ok(InMemoryStore::get_batch_metadata(self, batch_id))
  }

  async fn create_result(
    &self,
    partial: NewSubtaskResult,
    placement: ResultPlacement,
  ) -> Result<SubtaskResult, Error> {
    InMemoryStore::create_result(self, partial, placement)
  }

  async fn query(&self, query: &ResultQuery) -> Result<Vec<SubtaskResult>, Error> {
    Ok(InMemoryStore::query(self, query))
  }

  async fn get_reintegration_data(&self, workflow_id: &str) -> Result<ReintegrationData, Error> {
    Ok(InMemoryStore::get_reintegration_data(self, workflow_id))
  }

  async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<usize, Error> {
    Ok(InMemoryStore::cleanup(self, older_than))
  }

  async fn validate_integrity(&self, workflow_id: &str) -> Result<bool, Error> {
    Ok(InMemoryStore::validate_integrity(self, workflow_id))
  }
}
