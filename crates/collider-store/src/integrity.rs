//! Read-only integrity diagnostics over a workflow's indexed results.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::checksum::{compute_checksum, verify_checksum};
use crate::memory::Ledger;

/// A single integrity problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
  /// The index names a subtask the ledger no longer holds.
  MissingResult { subtask_id: String },

  /// The stored checksum does not match the result's content.
  ChecksumMismatch {
    subtask_id: String,
    stored: String,
    computed: String,
  },

  /// A dependency chain names a subtask the ledger does not hold.
  DanglingDependency {
    subtask_id: String,
    dependency_id: String,
  },
}

impl Ledger {
  pub(crate) fn integrity_violations(&self, workflow_id: &str) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();

    for subtask_id in self.index.subtask_ids(workflow_id) {
      let Some(result) = self.get(subtask_id) else {
        violations.push(IntegrityViolation::MissingResult {
          subtask_id: subtask_id.clone(),
        });
        continue;
      };

      if !verify_checksum(result) {
        violations.push(IntegrityViolation::ChecksumMismatch {
          subtask_id: subtask_id.clone(),
          stored: result.checksum.clone(),
          computed: compute_checksum(result),
        });
      }

      violations.extend(
        result
          .dependency_chain
          .iter()
          .filter(|dependency_id| self.get(dependency_id).is_none())
          .map(|dependency_id| IntegrityViolation::DanglingDependency {
            subtask_id: subtask_id.clone(),
            dependency_id: dependency_id.clone(),
          }),
      );
    }

    for violation in &violations {
      warn!(workflow_id, ?violation, "integrity violation");
    }

    violations
  }
}
