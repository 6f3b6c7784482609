use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// How long stored entries are kept and how often they are swept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetentionConfig {
  pub enabled: bool,
  /// Entries older than this many seconds are removed by a sweep.
  pub max_age_secs: u64,
  pub sweep_interval_secs: u64,
}

impl RetentionConfig {
  pub fn max_age(&self) -> Duration {
    Duration::from_secs(self.max_age_secs)
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs)
  }
}

impl Default for RetentionConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      max_age_secs: DEFAULT_MAX_AGE_SECS,
      sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
    }
  }
}
