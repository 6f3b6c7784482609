use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::SubtaskStatus;

/// Payload produced by the agent that executed a subtask.
///
/// Only `content` takes part in checksumming. `data` carries any structured
/// output the agent attached and is stored without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskOutput {
  #[serde(default)]
  pub content: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl SubtaskOutput {
  pub fn text(content: impl Into<String>) -> Self {
    Self {
      content: content.into(),
      ..Self::default()
    }
  }
}

/// The recorded outcome of one subtask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskResult {
  pub subtask_id: String,
  pub workflow_id: String,
  pub batch_id: String,
  /// Position of the subtask within its batch.
  pub batch_index: u32,
  pub agent_id: String,
  pub status: SubtaskStatus,
  /// Execution duration in milliseconds.
  pub execution_time: u64,
  pub retry_count: u32,
  pub result: SubtaskOutput,
  /// Transitive ancestors, nearest last.
  #[serde(default)]
  pub dependency_chain: Vec<String>,
  #[serde(default)]
  pub parent_subtask_ids: Vec<String>,
  #[serde(default)]
  pub child_subtask_ids: Vec<String>,
  /// Distance from the roots of the dependency graph.
  #[serde(default)]
  pub execution_level: u32,
  /// Store-wide sequence number assigned once at creation.
  pub execution_order: u64,
  pub storage_timestamp: DateTime<Utc>,
  pub checksum: String,
}

/// The producer-supplied part of a [`SubtaskResult`].
///
/// Passed to the store's `create_result` together with a [`ResultPlacement`];
/// the store fills in everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubtaskResult {
  pub subtask_id: String,
  #[serde(default)]
  pub agent_id: String,
  pub status: SubtaskStatus,
  #[serde(default)]
  pub execution_time: u64,
  #[serde(default)]
  pub retry_count: u32,
  #[serde(default)]
  pub result: SubtaskOutput,
}

impl NewSubtaskResult {
  pub fn new(
    subtask_id: impl Into<String>,
    agent_id: impl Into<String>,
    status: SubtaskStatus,
  ) -> Self {
    Self {
      subtask_id: subtask_id.into(),
      agent_id: agent_id.into(),
      status,
      execution_time: 0,
      retry_count: 0,
      result: SubtaskOutput::default(),
    }
  }

  pub fn with_content(mut self, content: impl Into<String>) -> Self {
    self.result.content = content.into();
    self
  }

  pub fn with_output(mut self, output: SubtaskOutput) -> Self {
    self.result = output;
    self
  }

  pub fn with_execution_time(mut self, millis: u64) -> Self {
    self.execution_time = millis;
    self
  }

  pub fn with_retry_count(mut self, retries: u32) -> Self {
    self.retry_count = retries;
    self
  }
}

/// Where a new result sits: its workflow, its batch, and its place in the
/// dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPlacement {
  pub workflow_id: String,
  pub batch_id: String,
  #[serde(default)]
  pub batch_index: u32,
  #[serde(default)]
  pub dependency_chain: Vec<String>,
  #[serde(default, alias = "parentIds")]
  pub parent_subtask_ids: Vec<String>,
  #[serde(default, alias = "childIds")]
  pub child_subtask_ids: Vec<String>,
  #[serde(default)]
  pub execution_level: u32,
}

impl ResultPlacement {
  pub fn new(workflow_id: impl Into<String>, batch_id: impl Into<String>, batch_index: u32) -> Self {
    Self {
      workflow_id: workflow_id.into(),
      batch_id: batch_id.into(),
      batch_index,
      ..Self::default()
    }
  }

  pub fn with_dependency_chain<I, S>(mut self, chain: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.dependency_chain = chain.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_parents<I, S>(mut self, parents: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.parent_subtask_ids = parents.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_children<I, S>(mut self, children: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.child_subtask_ids = children.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_level(mut self, level: u32) -> Self {
    self.execution_level = level;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_result_uses_camel_case_field_names() {
    let result = SubtaskResult {
      subtask_id: "s1".to_string(),
      workflow_id: "w1".to_string(),
      batch_id: "b1".to_string(),
      batch_index: 2,
      agent_id: "LocalCodeAgent".to_string(),
      status: SubtaskStatus::Completed,
      execution_time: 120,
      retry_count: 1,
      result: SubtaskOutput::text("done"),
      dependency_chain: vec!["s0".to_string()],
      parent_subtask_ids: vec!["s0".to_string()],
      child_subtask_ids: vec![],
      execution_level: 1,
      execution_order: 7,
      storage_timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
      checksum: "abc".to_string(),
    };

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["subtaskId"], "s1");
    assert_eq!(value["executionOrder"], 7);
    assert_eq!(value["parentSubtaskIds"], json!(["s0"]));
    assert_eq!(value["result"], json!({ "content": "done" }));
  }

  #[test]
  fn test_placement_accepts_short_relation_names() {
    let placement: ResultPlacement = serde_json::from_value(json!({
      "workflowId": "w1",
      "batchId": "b1",
      "parentIds": ["a"],
      "childIds": ["c"]
    }))
    .unwrap();

    assert_eq!(placement.batch_index, 0);
    assert_eq!(placement.parent_subtask_ids, vec!["a"]);
    assert_eq!(placement.child_subtask_ids, vec!["c"]);
    assert!(placement.dependency_chain.is_empty());
  }

  #[test]
  fn test_new_result_builders() {
    let partial = NewSubtaskResult::new("s1", "agent", SubtaskStatus::Running)
      .with_content("partial")
      .with_execution_time(40)
      .with_retry_count(2);

    assert_eq!(partial.result.content, "partial");
    assert_eq!(partial.execution_time, 40);
    assert_eq!(partial.retry_count, 2);
  }
}
