use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use collider_config::RetentionConfig;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::clock::Clock;
use crate::{Error, ResultStore};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically removes entries older than the configured maximum age.
///
/// ```ignore
/// let sweeper = RetentionSweeper::new(store.clone(), config.retention, Arc::new(SystemClock));
/// let cancel = CancellationToken::new();
/// tokio::spawn(sweeper.run(cancel.clone()));
/// // later
/// cancel.cancel();
/// ```
pub struct RetentionSweeper {
  store: Arc<dyn ResultStore>,
  config: RetentionConfig,
  clock: Arc<dyn Clock>,
}

impl RetentionSweeper {
  pub fn new(store: Arc<dyn ResultStore>, config: RetentionConfig, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      config,
      clock,
    }
  }

  /// Everything stored or started before this instant is expired.
  pub fn cutoff(&self) -> DateTime<Utc> {
    let max_age = TimeDelta::from_std(self.config.max_age()).unwrap_or(TimeDelta::MAX);
    self
      .clock
      .now()
      .checked_sub_signed(max_age)
      .unwrap_or(DateTime::<Utc>::MIN_UTC)
  }

  /// Run a single cleanup pass, returning how many entries were removed.
  pub async fn sweep_once(&self) -> Result<usize, Error> {
    let cutoff = self.cutoff();
    let removed = self.store.cleanup(cutoff).await?;
    info!(%cutoff, removed, "retention sweep completed");
    Ok(removed)
  }

  /// Sweep on every interval tick until cancelled.
  ///
  /// The first sweep runs immediately. A failed sweep is logged and retried
  /// on the next tick. Returns at once when retention is disabled.
  #[instrument(
    name = "retention_sweeper",
    skip(self, cancel),
    fields(
      max_age_secs = self.config.max_age_secs,
      sweep_interval_secs = self.config.sweep_interval_secs,
    )
  )]
  pub async fn run(self, cancel: CancellationToken) {
    if !self.config.enabled {
      info!("retention disabled, sweeper not started");
      return;
    }

    let period = self.config.sweep_interval().max(MIN_SWEEP_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("starting retention sweeper");

    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          info!("retention sweeper cancelled");
          break;
        }
        _ = interval.tick() => {
          if let Err(e) = self.sweep_once().await {
            error!(error = %e, retryable = e.is_retryable(), "retention sweep failed");
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::memory::InMemoryStore;
  use chrono::TimeZone;
  use collider_model::{NewSubtaskResult, ResultPlacement, SubtaskStatus};

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0).unwrap()
  }

  fn config(enabled: bool) -> RetentionConfig {
    RetentionConfig {
      enabled,
      max_age_secs: 3600,
      sweep_interval_secs: 1,
    }
  }

  /// A store holding one result saved two hours before `now()` and one saved
  /// at `now()`.
  fn seeded() -> (Arc<InMemoryStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now() - TimeDelta::hours(2)));
    let store = Arc::new(InMemoryStore::with_clock(clock.clone()));

    for id in ["old", "fresh"] {
      let result = store
        .create_result(
          NewSubtaskResult::new(id, "agent", SubtaskStatus::Completed),
          ResultPlacement::new("w1", "b1", 0),
        )
        .unwrap();
      store.save_result(result).unwrap();
      clock.set(now());
    }

    (store, clock)
  }

  #[test]
  fn test_cutoff_subtracts_max_age() {
    let (store, clock) = seeded();
    let sweeper = RetentionSweeper::new(store, config(true), clock);
    assert_eq!(sweeper.cutoff(), now() - TimeDelta::hours(1));
  }

  #[test]
  fn test_cutoff_saturates_for_huge_max_age() {
    let (store, clock) = seeded();
    let mut config = config(true);
    config.max_age_secs = u64::MAX;

    let sweeper = RetentionSweeper::new(store, config, clock);
    assert_eq!(sweeper.cutoff(), DateTime::<Utc>::MIN_UTC);
  }

  #[tokio::test]
  async fn test_sweep_once_removes_expired() {
    let (store, clock) = seeded();
    let sweeper = RetentionSweeper::new(store.clone(), config(true), clock);

    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);
    assert!(store.get_result("old").is_none());
    assert!(store.get_result("fresh").is_some());
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_run_sweeps_until_cancelled() {
    let (store, clock) = seeded();
    let sweeper = RetentionSweeper::new(store.clone(), config(true), clock);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(sweeper.run(cancel.clone()));

    for _ in 0..100 {
      if store.get_result("old").is_none() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(store.get_result("old").is_none());

    cancel.cancel();
    handle.await.unwrap();
    assert!(store.get_result("fresh").is_some());
  }

  #[tokio::test]
  async fn test_disabled_sweeper_returns_immediately() {
    let (store, clock) = seeded();
    let sweeper = RetentionSweeper::new(store.clone(), config(false), clock);

    sweeper.run(CancellationToken::new()).await;

    assert!(store.get_result("old").is_some());
  }
}
