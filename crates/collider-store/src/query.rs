//! Compound filters, ordering and pagination over stored results.

use chrono::{DateTime, Utc};
use collider_model::{SubtaskResult, SubtaskStatus};
use serde::{Deserialize, Serialize};

/// Inclusive range of storage timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl DateRange {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self { start, end }
  }

  pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
    self.start <= timestamp && timestamp <= self.end
  }
}

/// A result query. Every set field must match; an empty query matches all
/// results, so callers should set a `limit` on large stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultQuery {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub workflow_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub subtask_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub batch_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<SubtaskStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub agent_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_range: Option<DateRange>,
  /// Results to skip after sorting.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub offset: Option<usize>,
  /// Maximum number of results after the offset.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<usize>,
}

impl ResultQuery {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn workflow(mut self, workflow_id: impl Into<String>) -> Self {
    self.workflow_id = Some(workflow_id.into());
    self
  }

  pub fn subtask(mut self, subtask_id: impl Into<String>) -> Self {
    self.subtask_id = Some(subtask_id.into());
    self
  }

  pub fn batch(mut self, batch_id: impl Into<String>) -> Self {
    self.batch_id = Some(batch_id.into());
    self
  }

  pub fn status(mut self, status: SubtaskStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
    self.agent_id = Some(agent_id.into());
    self
  }

  pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    self.date_range = Some(DateRange::new(start, end));
    self
  }

  pub fn offset(mut self, offset: usize) -> Self {
    self.offset = Some(offset);
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Whether a single result passes every filter.
  pub fn matches(&self, result: &SubtaskResult) -> bool {
    fn field_matches(filter: &Option<String>, value: &str) -> bool {
      filter.as_deref().is_none_or(|expected| expected == value)
    }

    field_matches(&self.workflow_id, &result.workflow_id)
      && field_matches(&self.subtask_id, &result.subtask_id)
      && field_matches(&self.batch_id, &result.batch_id)
      && field_matches(&self.agent_id, &result.agent_id)
      && self.status.is_none_or(|status| status == result.status)
      && self
        .date_range
        .is_none_or(|range| range.contains(result.storage_timestamp))
  }

  /// Filter, sort ascending by execution order, then paginate.
  pub(crate) fn apply<'a, I>(&self, candidates: I) -> Vec<SubtaskResult>
  where
    I: IntoIterator<Item = &'a SubtaskResult>,
  {
    let mut matched: Vec<&SubtaskResult> = candidates
      .into_iter()
      .filter(|result| self.matches(result))
      .collect();
    matched.sort_by_key(|result| result.execution_order);

    matched
      .into_iter()
      .skip(self.offset.unwrap_or(0))
      .take(self.limit.unwrap_or(usize::MAX))
      .cloned()
      .collect()
  }
}
