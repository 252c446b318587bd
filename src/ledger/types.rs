//! Data types for the maintenance-outage ledger.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::decoder::Observation;

/// Hard cap on retained outage events. Oldest entries are dropped first;
/// there is no time-based expiry.
pub const MAX_EVENTS: usize = 1000;

/// One discrete maintenance-downtime interval for a station.
///
/// Append-only: opened on an UP→DOWN transition, closed in place on the next
/// DOWN→UP. At most one event per station is open (`end_epoch_ms == None`)
/// at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutageEvent {
    pub station_id: String,
    /// Denormalized at creation time so the leaderboard renders without a
    /// station lookup.
    pub station_name: Option<String>,
    pub start_epoch_ms: i64,
    pub start_zulu: String,
    pub end_epoch_ms: Option<i64>,
    pub end_zulu: Option<String>,
    pub duration_minutes: Option<i64>,
}

impl OutageEvent {
    pub fn is_open(&self) -> bool {
        self.end_epoch_ms.is_none()
    }
}

/// Last recorded flag state for a station; the baseline new samples diff
/// against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatus {
    pub has_flag: bool,
    pub last_seen_wall_clock_ms: i64,
    pub last_observation_epoch_ms: i64,
    pub last_observation_zulu: String,
    pub station_name: Option<String>,
}

/// The persisted ledger: per-station status plus the insertion-ordered event
/// log. Loaded whole, mutated in memory, written back whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    pub statuses: HashMap<String, StationStatus>,
    pub events: Vec<OutageEvent>,
}

impl Ledger {
    /// The station's open event, if one exists.
    pub fn open_event_mut(&mut self, station_id: &str) -> Option<&mut OutageEvent> {
        self.events
            .iter_mut()
            .rev()
            .find(|event| event.station_id == station_id && event.is_open())
    }

    pub fn has_open_event(&self, station_id: &str) -> bool {
        self.events
            .iter()
            .any(|event| event.station_id == station_id && event.is_open())
    }
}

/// One per-station flag sample submitted to the ledger.
#[derive(Debug, Clone)]
pub struct StatusSample {
    pub station_id: String,
    pub station_name: Option<String>,
    pub has_flag: bool,
    pub observation_epoch_ms: i64,
    pub observation_zulu: String,
}

impl From<&Observation> for StatusSample {
    fn from(observation: &Observation) -> Self {
        Self {
            station_id: observation.station_id.clone(),
            station_name: observation.station_name.clone(),
            has_flag: observation.has_maintenance_flag,
            observation_epoch_ms: observation.observation_epoch_ms,
            observation_zulu: observation.observation_zulu.clone(),
        }
    }
}
