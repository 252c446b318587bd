//! Maintenance-outage tracking.
//!
//! This module watches the trailing-`$` maintenance flag across successive
//! observations per station and reconstructs discrete downtime intervals: a
//! per-station UP/DOWN state machine over [`StatusSample`]s, an append-only
//! capped event log, whole-blob persistence, and derived leaderboard
//! statistics.

mod grade;
mod stats;
mod store;
mod types;
mod update;
mod util;

pub use stats::{StationStats, station_stats};
pub use store::{LedgerStore, MemoryLedgerStore, S3LedgerStore};
pub use types::{Ledger, MAX_EVENTS, OutageEvent, StationStatus, StatusSample};
pub use update::apply_samples;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// The outage ledger service: one read-modify-write cycle per batch over a
/// [`LedgerStore`].
pub struct OutageLedger<S> {
    store: S,
}

impl<S: LedgerStore> OutageLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads the persisted ledger, failing open: a missing, unreadable, or
    /// corrupt blob reads as an empty ledger so one bad read never takes the
    /// pipeline down.
    pub async fn load(&self) -> Ledger {
        match self.store.get().await {
            Ok(Some(blob)) => match serde_json::from_slice(&blob) {
                Ok(ledger) => ledger,
                Err(e) => {
                    warn!(error = %e, "ledger blob is corrupt, starting empty");
                    Ledger::default()
                }
            },
            Ok(None) => {
                debug!("no ledger blob yet, starting empty");
                Ledger::default()
            }
            Err(e) => {
                warn!(error = %e, "ledger read failed, starting empty");
                Ledger::default()
            }
        }
    }

    /// Applies one batch of samples and persists the result.
    ///
    /// A write failure propagates to the caller and the in-memory mutation
    /// is discarded; re-running the batch is safe.
    pub async fn record_batch(&self, samples: &[StatusSample], now_ms: i64) -> Result<Ledger> {
        let mut ledger = self.load().await;
        apply_samples(&mut ledger, samples, now_ms);

        let blob = serde_json::to_vec(&ledger)?;
        self.store
            .set(&blob)
            .await
            .context("ledger write failed, batch not recorded")?;
        Ok(ledger)
    }

    /// Recomputes the per-station leaderboard from the persisted ledger.
    pub async fn stats(&self, now_ms: i64) -> Vec<StationStats> {
        station_stats(&self.load().await, now_ms)
    }

    /// Drops the persisted ledger entirely.
    pub async fn reset(&self) -> Result<()> {
        self.store.delete().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    const T0: i64 = 1_754_580_000_000;

    fn sample(has_flag: bool, epoch_ms: i64) -> StatusSample {
        StatusSample {
            station_id: "KORD".to_string(),
            station_name: Some("Chicago O'Hare Intl".to_string()),
            has_flag,
            observation_epoch_ms: epoch_ms,
            observation_zulu: "071651Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_batch_persists_through_the_store() {
        let ledger = OutageLedger::new(MemoryLedgerStore::new());

        ledger.record_batch(&[sample(false, T0)], T0).await.unwrap();
        ledger.record_batch(&[sample(true, T0 + 60_000)], T0).await.unwrap();

        // Each cycle re-reads the blob, so a fresh load sees the open outage.
        let reloaded = ledger.load().await;
        assert_eq!(reloaded.events.len(), 1);
        assert!(reloaded.events[0].is_open());
        assert!(reloaded.statuses["KORD"].has_flag);
    }

    #[tokio::test]
    async fn test_load_fails_open_on_corrupt_blob() {
        let store = MemoryLedgerStore::new();
        store.set(b"not json at all").await.unwrap();

        let ledger = OutageLedger::new(store).load().await;
        assert!(ledger.events.is_empty());
        assert!(ledger.statuses.is_empty());
    }

    struct FailingStore;

    #[async_trait]
    impl LedgerStore for FailingStore {
        async fn get(&self) -> Result<Option<Vec<u8>>> {
            Err(anyhow!("store unavailable"))
        }
        async fn set(&self, _blob: &[u8]) -> Result<()> {
            Err(anyhow!("store unavailable"))
        }
        async fn delete(&self) -> Result<()> {
            Err(anyhow!("store unavailable"))
        }
    }

    #[tokio::test]
    async fn test_read_failure_is_empty_write_failure_propagates() {
        let ledger = OutageLedger::new(FailingStore);

        // GET fails open
        assert!(ledger.load().await.events.is_empty());

        // SET surfaces the failure
        let err = ledger.record_batch(&[sample(true, T0)], T0).await.unwrap_err();
        assert!(err.to_string().contains("batch not recorded"));
    }
}
