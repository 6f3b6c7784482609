//! Secondary index from workflow id to the subtask ids stored under it.
//!
//! The index is derived from the ledger and never the source of truth. It is
//! owned by the ledger and only mutated under the ledger's write guard.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WorkflowIndex {
  entries: HashMap<String, Vec<String>>,
}

impl WorkflowIndex {
  /// Rebuild from `(workflow_id, subtask_id)` pairs given in insertion order.
  pub(crate) fn rebuild<'a, I>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (&'a str, &'a str)>,
  {
    let mut index = Self::default();
    for (workflow_id, subtask_id) in pairs {
      index.insert(workflow_id, subtask_id);
    }
    index
  }

  /// Append a subtask id to a workflow. Returns `false` if already present.
  pub(crate) fn insert(&mut self, workflow_id: &str, subtask_id: &str) -> bool {
    let ids = self.entries.entry(workflow_id.to_string()).or_default();
    if ids.iter().any(|id| id == subtask_id) {
      return false;
    }
    ids.push(subtask_id.to_string());
    true
  }

  /// Remove a subtask id from a workflow, dropping the workflow once empty.
  pub(crate) fn remove(&mut self, workflow_id: &str, subtask_id: &str) {
    if let Some(ids) = self.entries.get_mut(workflow_id) {
      ids.retain(|id| id != subtask_id);
      if ids.is_empty() {
        self.entries.remove(workflow_id);
      }
    }
  }

  pub(crate) fn subtask_ids(&self, workflow_id: &str) -> &[String] {
    self
      .entries
      .get(workflow_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub(crate) fn workflow_count(&self) -> usize {
    self.entries.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_insert_is_idempotent() {
    let mut index = WorkflowIndex::default();
    assert!(index.insert("w1", "a"));
    assert!(index.insert("w1", "b"));
    assert!(!index.insert("w1", "a"));

    assert_eq!(index.subtask_ids("w1"), ["a", "b"]);
  }

  #[test]
  fn test_remove_drops_empty_workflow() {
    let mut index = WorkflowIndex::default();
    index.insert("w1", "a");
    index.insert("w2", "b");

    index.remove("w1", "a");
    index.remove("w2", "missing");

    assert!(index.subtask_ids("w1").is_empty());
    assert_eq!(index.workflow_count(), 1);
  }

  #[test]
  fn test_rebuild_preserves_order() {
    let index = WorkflowIndex::rebuild([("w1", "c"), ("w2", "x"), ("w1", "a"), ("w1", "c")]);

    assert_eq!(index.subtask_ids("w1"), ["c", "a"]);
    assert_eq!(index.subtask_ids("w2"), ["x"]);
    assert!(index.subtask_ids("w3").is_empty());
  }
}
