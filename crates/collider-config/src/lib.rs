//! Collider Config
//!
//! This crate contains the serializable configuration for the Collider result
//! store and its tooling. Configuration is read from a JSON file; every field
//! has a default so an empty object (or no file at all) is a valid config.
//!
//! ```json
//! {
//!   "snapshotPath": "/var/lib/collider/snapshot.json",
//!   "defaultQueryLimit": 100,
//!   "retention": { "maxAgeSecs": 86400, "sweepIntervalSecs": 600 }
//! }
//! ```

mod retention;

pub use retention::RetentionConfig;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config: {0}")]
  Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
  /// Snapshot file the CLI loads and saves.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub snapshot_path: Option<PathBuf>,

  /// Page size applied to queries that do not set a limit.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub default_query_limit: Option<usize>,

  pub retention: RetentionConfig,
}

impl StoreConfig {
  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  /// Load configuration from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&contents)
  }

  /// Load configuration from `path` if it exists, defaults otherwise.
  pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
    if path.exists() {
      Self::load(path)
    } else {
      Ok(Self::default())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn test_empty_object_uses_defaults() {
    let config = StoreConfig::from_json_str("{}").unwrap();
    assert_eq!(config, StoreConfig::default());
    assert!(config.retention.enabled);
    assert_eq!(config.retention.max_age(), Duration::from_secs(7 * 24 * 60 * 60));
  }

  #[test]
  fn test_partial_retention_override() {
    let config = StoreConfig::from_json_str(
      r#"{ "defaultQueryLimit": 50, "retention": { "maxAgeSecs": 60 } }"#,
    )
    .unwrap();

    assert_eq!(config.default_query_limit, Some(50));
    assert_eq!(config.retention.max_age(), Duration::from_secs(60));
    assert_eq!(config.retention.sweep_interval(), Duration::from_secs(60 * 60));
  }

  #[test]
  fn test_invalid_json_is_parse_error() {
    let err = StoreConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn test_load_or_default_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::load_or_default(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, StoreConfig::default());
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "snapshotPath": "/tmp/snap.json" }"#).unwrap();

    let config = StoreConfig::load(&path).unwrap();
    assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/snap.json")));
  }
}
