use collider_model::SubtaskResult;
use serde::{Deserialize, Serialize};

/// One subtask and its direct relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraphNode {
  pub subtask_id: String,
  /// Direct parents (`parentSubtaskIds`).
  pub dependencies: Vec<String>,
  /// Direct children (`childSubtaskIds`).
  pub dependents: Vec<String>,
  /// Execution level of the subtask.
  pub level: u32,
}

impl From<&SubtaskResult> for DependencyGraphNode {
  fn from(result: &SubtaskResult) -> Self {
    Self {
      subtask_id: result.subtask_id.clone(),
      dependencies: result.parent_subtask_ids.clone(),
      dependents: result.child_subtask_ids.clone(),
      level: result.execution_level,
    }
  }
}

/// Build one node per result, preserving input order.
pub fn build_graph(results: &[SubtaskResult]) -> Vec<DependencyGraphNode> {
  results.iter().map(DependencyGraphNode::from).collect()
}
