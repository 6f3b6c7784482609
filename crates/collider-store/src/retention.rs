//! Retention cleanup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::memory::Ledger;

/// Entries removed by a cleanup, per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
  pub results: usize,
  pub execution_states: usize,
  pub batches: usize,
}

impl CleanupReport {
  pub fn total(&self) -> usize {
    self.results + self.execution_states + self.batches
  }
}

impl Ledger {
  /// Drop results stored before `cutoff` and execution states and batches
  /// started before it, then rebuild the workflow index from what is left.
  ///
  /// Runs under the store's write guard so readers never see a half-rebuilt
  /// index.
  #[instrument(level = "debug", skip(self))]
  pub(crate) fn remove_older_than(&mut self, cutoff: DateTime<Utc>) -> CleanupReport {
    let results_before = self.results.len();
    self
      .results
      .retain(|_, stored| stored.result.storage_timestamp >= cutoff);

    let states_before = self.execution_states.len();
    self
      .execution_states
      .retain(|_, state| state.start_time >= cutoff);

    let batches_before = self.batches.len();
    self.batches.retain(|_, batch| batch.start_time >= cutoff);

    self.rebuild_index();

    let report = CleanupReport {
      results: results_before - self.results.len(),
      execution_states: states_before - self.execution_states.len(),
      batches: batches_before - self.batches.len(),
    };

    info!(
      %cutoff,
      results = report.results,
      execution_states = report.execution_states,
      batches = report.batches,
      "retention cleanup finished"
    );

    report
  }
}
