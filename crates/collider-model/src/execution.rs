use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run status of a whole workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
  Queued,
  Running,
  Paused,
  Completed,
  Failed,
  Cancelled,
}

/// Snapshot of a workflow's run state.
///
/// Saved and loaded as a whole value keyed by `workflow_id`; there is no
/// field-level merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
  pub workflow_id: String,
  pub status: WorkflowStatus,
  pub start_time: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_time: Option<DateTime<Utc>>,
  /// Deepest dependency level the scheduler has dispatched.
  #[serde(default)]
  pub current_level: u32,
  #[serde(default)]
  pub completed_subtasks: Vec<String>,
  /// Scheduler-owned state, stored verbatim.
  #[serde(default)]
  pub context: serde_json::Value,
}

impl ExecutionState {
  pub fn new(workflow_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      status: WorkflowStatus::Running,
      start_time,
      end_time: None,
      current_level: 0,
      completed_subtasks: Vec::new(),
      context: serde_json::Value::Null,
    }
  }
}
