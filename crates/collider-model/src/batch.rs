use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Batch status that ends a batch successfully.
pub const BATCH_STATUS_COMPLETED: &str = "completed";

/// Batch status that ends a batch unsuccessfully.
pub const BATCH_STATUS_FAILED: &str = "failed";

/// A group of subtasks processed together.
///
/// `status` is free-form; only [`BATCH_STATUS_COMPLETED`] and
/// [`BATCH_STATUS_FAILED`] carry meaning to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMetadata {
  pub batch_id: String,
  pub status: String,
  pub start_time: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub end_time: Option<DateTime<Utc>>,
}

impl BatchMetadata {
  pub fn new(
    batch_id: impl Into<String>,
    status: impl Into<String>,
    start_time: DateTime<Utc>,
  ) -> Self {
    Self {
      batch_id: batch_id.into(),
      status: status.into(),
      start_time,
      end_time: None,
    }
  }

  /// Whether `status` closes a batch and stamps its end time.
  pub fn is_terminal_status(status: &str) -> bool {
    status == BATCH_STATUS_COMPLETED || status == BATCH_STATUS_FAILED
  }
}
