//! Collider Store
//!
//! This crate records the outcome of every subtask produced by a multi-agent
//! execution pipeline, indexes results by workflow and batch, verifies their
//! integrity, and reassembles a workflow's results and dependency structure
//! for resumption or audit.
//!
//! The [`ResultStore`] trait defines the backend contract:
//! - Creating, saving and updating subtask results
//! - Saving and loading workflow execution state and batch metadata
//! - Filtered, ordered and paginated queries
//! - Reintegration snapshots with summary statistics
//! - Retention cleanup and integrity validation
//!
//! [`InMemoryStore`] is the in-process implementation. A durable backend can
//! be substituted behind the same trait; it must keep execution order
//! monotonic across restarts.
//!
//! # Ordering
//!
//! Every result gets an `execution_order` from [`ResultStore::create_result`].
//! The value is unique across the whole store, never reused, and is the sort
//! key for queries and reintegration.

mod checksum;
mod clock;
mod index;
mod integrity;
mod memory;
mod query;
mod reintegration;
mod retention;
pub mod snapshot;
mod sweeper;

pub use checksum::{compute_checksum, verify_checksum};
pub use clock::{Clock, ManualClock, SystemClock};
pub use integrity::IntegrityViolation;
pub use memory::{InMemoryStore, StoreStats};
pub use query::{DateRange, ResultQuery};
pub use reintegration::{ExecutionSummary, ReintegrationData};
pub use retention::CleanupReport;
pub use snapshot::StoreSnapshot;
pub use sweeper::RetentionSweeper;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use collider_model::{
  BatchMetadata, ExecutionState, NewSubtaskResult, ResultPlacement, SubtaskResult, SubtaskStatus,
};

/// Error type for storage operations.
///
/// Looking up or updating an unknown id is not an error; those operations
/// return `None` or do nothing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A write was missing a required identity field.
  #[error("invalid {field}: {reason}")]
  InvalidInput { field: &'static str, reason: String },

  /// The backend could not be reached. Safe to retry.
  #[error("backend unavailable: {0}")]
  BackendUnavailable(String),

  /// A snapshot could not be encoded or decoded.
  #[error("snapshot encoding error: {0}")]
  Snapshot(#[from] serde_json::Error),

  /// The snapshot was written by a newer format version.
  #[error("unsupported snapshot version: {0}")]
  UnsupportedSnapshot(u32),

  /// Reading or writing a snapshot file failed.
  #[error("snapshot io error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
    Error::InvalidInput {
      field,
      reason: reason.into(),
    }
  }

  /// Whether the failed call may succeed if repeated unchanged.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Error::BackendUnavailable(_))
  }
}

/// Storage trait for subtask results, execution state and batch metadata.
#[async_trait]
pub trait ResultStore: Send + Sync {
  /// Store or overwrite a result by subtask id.
  ///
  /// Stamps the storage timestamp, recomputes the checksum and adds the id to
  /// its workflow's index if it is new there. Last write wins, but the
  /// execution order must come from [`ResultStore::create_result`] and never
  /// changes once stored.
  async fn save_result(&self, result: SubtaskResult) -> Result<(), Error>;

  /// Change the status of a stored result. Unknown ids are ignored.
  async fn update_status(&self, subtask_id: &str, status: SubtaskStatus) -> Result<(), Error>;

  /// Get a result by subtask id.
  async fn get_result(&self, subtask_id: &str) -> Result<Option<SubtaskResult>, Error>;

  /// Replace the execution state of a workflow.
  async fn save_execution_state(&self, state: ExecutionState) -> Result<(), Error>;

  /// Load the execution state of a workflow.
  async fn load_execution_state(&self, workflow_id: &str) -> Result<Option<ExecutionState>, Error>;

  /// Replace the metadata of a batch.
  async fn save_batch_metadata(&self, metadata: BatchMetadata) -> Result<(), Error>;

  /// Change the status of a batch, stamping its end time when the status is
  /// terminal. Unknown ids are ignored.
  async fn update_batch_status(&self, batch_id: &str, status: &str) -> Result<(), Error>;

  /// Get the metadata of a batch.
  async fn get_batch_metadata(&self, batch_id: &str) -> Result<Option<BatchMetadata>, Error>;

  /// Build a complete result with the next execution order. Does not persist
  /// it; call [`ResultStore::save_result`] to commit.
  async fn create_result(
    &self,
    partial: NewSubtaskResult,
    placement: ResultPlacement,
  ) -> Result<SubtaskResult, Error>;

  /// Results matching the query, ascending by execution order.
  async fn query(&self, query: &ResultQuery) -> Result<Vec<SubtaskResult>, Error>;

  /// Everything needed to resume, audit or merge a workflow.
  async fn get_reintegration_data(&self, workflow_id: &str) -> Result<ReintegrationData, Error>;

  /// Remove entries older than `older_than`, returning how many were removed.
  async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<usize, Error>;

  /// Check that every result indexed under the workflow exists, matches its
  /// checksum and has no dangling dependencies.
  async fn validate_integrity(&self, workflow_id: &str) -> Result<bool, Error>;
}
