//! Nationwide sweep: partitioned fetch, merge, and dedup.
//!
//! The partition key-space is the US state abbreviations. Partitions are
//! fetched in fixed-size concurrent groups, one group at a time, which bounds
//! outbound concurrency without a semaphore. A failed partition contributes
//! zero observations and never aborts the sweep.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::decoder::{Observation, decode_records};
use crate::provider::WeatherApi;

/// The 50 US state abbreviations plus DC.
pub const US_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

/// Partition fetches issued concurrently per group.
pub const PARTITION_BATCH_SIZE: usize = 10;

/// Recency window passed to the provider, in hours.
pub const RECENCY_WINDOW_HOURS: f64 = 1.5;

/// Result of one nationwide sweep.
pub struct Sweep {
    /// Deduplicated observations, one per station, in no particular order.
    pub observations: Vec<Observation>,
    pub partitions_failed: usize,
}

/// Fetches every state partition and merges the results down to one
/// freshest observation per station.
///
/// Stateless: each call is a fresh fetch-and-merge, safe to retry.
#[tracing::instrument(skip(api))]
pub async fn sweep_states<A: WeatherApi + 'static>(api: Arc<A>) -> Sweep {
    let mut merged: HashMap<String, Observation> = HashMap::new();
    let mut partitions_failed = 0usize;

    for group in US_STATES.chunks(PARTITION_BATCH_SIZE) {
        let mut handles = Vec::with_capacity(group.len());

        for &state in group {
            let api = Arc::clone(&api);
            handles.push(tokio::spawn(async move {
                match api.metars_for_state(state, RECENCY_WINDOW_HOURS).await {
                    Ok(records) => {
                        let observations = decode_records(&records);
                        debug!(state, count = observations.len(), "partition fetched");
                        Ok(observations)
                    }
                    Err(e) => {
                        warn!(state, error = %e, "partition fetch failed");
                        Err(())
                    }
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(observations)) => merge_observations(&mut merged, observations),
                Ok(Err(())) => partitions_failed += 1,
                Err(e) => {
                    warn!(error = %e, "partition task failed");
                    partitions_failed += 1;
                }
            }
        }
    }

    Sweep {
        observations: merged.into_values().collect(),
        partitions_failed,
    }
}

/// Merges a batch into the per-station map, keeping the freshest report.
///
/// Freshness compares the `DDHHMMZ` strings lexicographically, which is
/// sound because the field is fixed-width zero-padded. An empty string sorts
/// lowest, so a report with no time token never displaces one with a time.
/// Stations straddling state borders show up in both partitions; ties keep
/// the already-merged record.
pub fn merge_observations(merged: &mut HashMap<String, Observation>, incoming: Vec<Observation>) {
    for observation in incoming {
        match merged.get(&observation.station_id) {
            Some(existing) if existing.observation_zulu >= observation.observation_zulu => {}
            _ => {
                merged.insert(observation.station_id.clone(), observation);
            }
        }
    }
}

/// Fetches and decodes reports for an explicit station id list.
///
/// Ids failing the four-character shape check reject the whole call before
/// any network I/O.
pub async fn fetch_stations<A: WeatherApi>(api: &A, ids: &[String]) -> Result<Vec<Observation>> {
    for id in ids {
        if id.len() != 4 {
            bail!("invalid station id {id:?}: expected a 4-character identifier");
        }
    }

    let records = api.metars_for_ids(ids, RECENCY_WINDOW_HOURS).await?;
    Ok(decode_records(&records))
}
