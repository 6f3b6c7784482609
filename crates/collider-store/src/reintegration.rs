//! Workflow reintegration snapshots.

use std::collections::HashSet;

use collider_graph::{DependencyGraphNode, build_graph};
use collider_model::{BatchMetadata, SubtaskResult, SubtaskStatus};
use serde::{Deserialize, Serialize};

/// Aggregate statistics over a workflow's results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
  pub total_subtasks: usize,
  pub completed: usize,
  pub failed: usize,
  /// Sum of execution times in milliseconds, saturating at `u64::MAX`.
  pub total_duration: u64,
  /// Zero when there are no subtasks.
  pub average_execution_time: f64,
}

impl ExecutionSummary {
  pub fn from_results(results: &[SubtaskResult]) -> Self {
    let total_subtasks = results.len();
    let count = |status: SubtaskStatus| results.iter().filter(|r| r.status == status).count();
    let total_duration = results
      .iter()
      .map(|r| r.execution_time)
      .fold(0u64, u64::saturating_add);

    let average_execution_time = if total_subtasks == 0 {
      0.0
    } else {
      total_duration as f64 / total_subtasks as f64
    };

    Self {
      total_subtasks,
      completed: count(SubtaskStatus::Completed),
      failed: count(SubtaskStatus::Failed),
      total_duration,
      average_execution_time,
    }
  }
}

/// A workflow's results, dependency structure and statistics, computed fresh
/// per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReintegrationData {
  pub workflow_id: String,
  /// Results ascending by execution order.
  pub subtask_results: Vec<SubtaskResult>,
  /// Subtask ids ascending by execution order.
  pub execution_order: Vec<String>,
  pub dependency_graph: Vec<DependencyGraphNode>,
  /// One entry per distinct batch seen among the results, in first-seen order.
  pub batch_metadata: Vec<BatchMetadata>,
  pub execution_summary: ExecutionSummary,
}

impl ReintegrationData {
  /// Assemble from results already sorted by execution order.
  ///
  /// `lookup_batch` resolves batch ids; batches it does not know are skipped.
  pub(crate) fn assemble<F>(
    workflow_id: &str,
    subtask_results: Vec<SubtaskResult>,
    lookup_batch: F,
  ) -> Self
  where
    F: Fn(&str) -> Option<BatchMetadata>,
  {
    let execution_order: Vec<String> = subtask_results
      .iter()
      .map(|r| r.subtask_id.clone())
      .collect();

    let batch_metadata: Vec<BatchMetadata> = {
      let mut seen = HashSet::new();
      subtask_results
        .iter()
        .filter(|r| seen.insert(r.batch_id.as_str()))
        .filter_map(|r| lookup_batch(&r.batch_id))
        .collect()
    };

    Self {
      workflow_id: workflow_id.to_string(),
      execution_order,
      dependency_graph: build_graph(&subtask_results),
      batch_metadata,
      execution_summary: ExecutionSummary::from_results(&subtask_results),
      subtask_results,
    }
  }
}
