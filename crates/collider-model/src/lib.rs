//! Collider Model
//!
//! This crate contains the value types recorded by the Collider result store.
//! They describe the outcome of subtasks produced by a multi-agent execution
//! pipeline, the run state of whole workflows, and the batches subtasks are
//! processed in.
//!
//! All types serialize with camelCase field names so snapshots and external
//! consumers see the same names regardless of the backend that produced them.
//!
//! Derived fields (`executionOrder`, `storageTimestamp`, `checksum`) are
//! assigned by the store, never by producers.

mod batch;
mod execution;
mod result;
mod status;

pub use batch::{BATCH_STATUS_COMPLETED, BATCH_STATUS_FAILED, BatchMetadata};
pub use execution::{ExecutionState, WorkflowStatus};
pub use result::{NewSubtaskResult, ResultPlacement, SubtaskOutput, SubtaskResult};
pub use status::{ParseStatusError, SubtaskStatus};
