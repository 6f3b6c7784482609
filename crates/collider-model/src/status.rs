use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a single subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
  Pending,
  Running,
  Completed,
  Failed,
  Cancelled,
}

impl SubtaskStatus {
  pub const ALL: [SubtaskStatus; 5] = [
    SubtaskStatus::Pending,
    SubtaskStatus::Running,
    SubtaskStatus::Completed,
    SubtaskStatus::Failed,
    SubtaskStatus::Cancelled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      SubtaskStatus::Pending => "pending",
      SubtaskStatus::Running => "running",
      SubtaskStatus::Completed => "completed",
      SubtaskStatus::Failed => "failed",
      SubtaskStatus::Cancelled => "cancelled",
    }
  }
}

impl fmt::Display for SubtaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Returned when a string does not name a [`SubtaskStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown subtask status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for SubtaskStatus {
  type Err = ParseStatusError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalized = s.trim().to_ascii_lowercase();
    SubtaskStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == normalized)
      .ok_or_else(|| ParseStatusError(s.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_status() {
    assert_eq!("failed".parse::<SubtaskStatus>(), Ok(SubtaskStatus::Failed));
    assert_eq!(" Completed ".parse::<SubtaskStatus>(), Ok(SubtaskStatus::Completed));
    assert!("done".parse::<SubtaskStatus>().is_err());
  }

  #[test]
  fn test_status_serializes_snake_case() {
    let json = serde_json::to_string(&SubtaskStatus::Cancelled).unwrap();
    assert_eq!(json, "\"cancelled\"");
  }
}
