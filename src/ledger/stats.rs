//! Derived per-station outage statistics.
//!
//! Recomputed on demand from the event log, never persisted and never
//! incrementally maintained.

use std::collections::HashMap;

use serde::Serialize;

use super::grade::grade;
use super::types::{Ledger, OutageEvent};
use super::util::{mean, stddev};

/// Leaderboard statistics for one station.
#[derive(Debug, Clone, Serialize)]
pub struct StationStats {
    pub station_id: String,
    pub station_name: Option<String>,
    pub total_outages: usize,
    pub total_downtime_minutes: i64,
    /// Mean over closed events only, rounded; 0 when none are closed.
    pub average_downtime_minutes: i64,
    pub stddev_downtime_minutes: f64,
    pub longest_outage_minutes: i64,
    pub first_outage_epoch_ms: i64,
    pub last_outage_epoch_ms: i64,
    pub currently_down: bool,
    /// Closed downtime over the elapsed tracked window (first outage start
    /// to `now_ms`), as a percentage clamped to [0, 100]. 0 when no closed
    /// events exist.
    pub downtime_percentage: f64,
    pub reliability_grade: String,
}

/// Computes stats for every station with at least one recorded event,
/// ranked by total downtime (worst first).
pub fn station_stats(ledger: &Ledger, now_ms: i64) -> Vec<StationStats> {
    let mut by_station: HashMap<&str, Vec<&OutageEvent>> = HashMap::new();
    for event in &ledger.events {
        by_station
            .entry(event.station_id.as_str())
            .or_default()
            .push(event);
    }

    let mut stats: Vec<StationStats> = by_station
        .into_iter()
        .map(|(station_id, events)| stats_for_station(station_id, &events, now_ms))
        .collect();

    stats.sort_by(|a, b| {
        b.total_downtime_minutes
            .cmp(&a.total_downtime_minutes)
            .then_with(|| a.station_id.cmp(&b.station_id))
    });
    stats
}

fn stats_for_station(station_id: &str, events: &[&OutageEvent], now_ms: i64) -> StationStats {
    let closed_minutes: Vec<f64> = events
        .iter()
        .filter_map(|event| event.duration_minutes)
        .map(|minutes| minutes as f64)
        .collect();

    let total_downtime_minutes: i64 = events.iter().filter_map(|e| e.duration_minutes).sum();
    let average_downtime_minutes = if closed_minutes.is_empty() {
        0
    } else {
        mean(&closed_minutes).round() as i64
    };
    let longest_outage_minutes = events.iter().filter_map(|e| e.duration_minutes).max().unwrap_or(0);

    // Every station in the map has at least one event.
    let first_outage_epoch_ms = events.iter().map(|e| e.start_epoch_ms).min().unwrap_or(0);
    let last_outage_epoch_ms = events.iter().map(|e| e.start_epoch_ms).max().unwrap_or(0);

    let downtime_percentage = if closed_minutes.is_empty() {
        0.0
    } else {
        let elapsed_minutes = (now_ms - first_outage_epoch_ms) as f64 / 60_000.0;
        if elapsed_minutes <= 0.0 {
            0.0
        } else {
            (total_downtime_minutes as f64 / elapsed_minutes * 100.0).clamp(0.0, 100.0)
        }
    };

    StationStats {
        station_id: station_id.to_string(),
        station_name: events
            .iter()
            .find_map(|event| event.station_name.clone()),
        total_outages: events.len(),
        total_downtime_minutes,
        average_downtime_minutes,
        stddev_downtime_minutes: stddev(&closed_minutes, mean(&closed_minutes)),
        longest_outage_minutes,
        first_outage_epoch_ms,
        last_outage_epoch_ms,
        currently_down: events.iter().any(|event| event.is_open()),
        downtime_percentage,
        reliability_grade: grade(1.0 - downtime_percentage / 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_754_580_000_000;
    const MIN: i64 = 60_000;

    fn closed_event(station_id: &str, start_ms: i64, minutes: i64) -> OutageEvent {
        OutageEvent {
            station_id: station_id.to_string(),
            station_name: Some(format!("{station_id} Intl")),
            start_epoch_ms: start_ms,
            start_zulu: "071000Z".to_string(),
            end_epoch_ms: Some(start_ms + minutes * MIN),
            end_zulu: Some("071100Z".to_string()),
            duration_minutes: Some(minutes),
        }
    }

    fn open_event(station_id: &str, start_ms: i64) -> OutageEvent {
        OutageEvent {
            station_id: station_id.to_string(),
            station_name: None,
            start_epoch_ms: start_ms,
            start_zulu: "071200Z".to_string(),
            end_epoch_ms: None,
            end_zulu: None,
            duration_minutes: None,
        }
    }

    #[test]
    fn test_two_closed_events() {
        let ledger = Ledger {
            statuses: Default::default(),
            events: vec![
                closed_event("KXXX", T0, 30),
                closed_event("KXXX", T0 + 120 * MIN, 90),
            ],
        };

        let stats = station_stats(&ledger, T0 + 300 * MIN);
        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!(s.total_outages, 2);
        assert_eq!(s.total_downtime_minutes, 120);
        assert_eq!(s.average_downtime_minutes, 60);
        assert_eq!(s.longest_outage_minutes, 90);
        assert_eq!(s.stddev_downtime_minutes, 30.0);
        assert_eq!(s.first_outage_epoch_ms, T0);
        assert_eq!(s.last_outage_epoch_ms, T0 + 120 * MIN);
        assert!(!s.currently_down);
        // 120 minutes down over a 300-minute tracked window
        assert!((s.downtime_percentage - 40.0).abs() < 1e-9);
        assert_eq!(s.reliability_grade, "D");
    }

    #[test]
    fn test_open_event_only_has_no_percentage() {
        let ledger = Ledger {
            statuses: Default::default(),
            events: vec![open_event("KXXX", T0)],
        };

        let stats = station_stats(&ledger, T0 + 60 * MIN);
        let s = &stats[0];
        assert_eq!(s.total_outages, 1);
        assert_eq!(s.total_downtime_minutes, 0);
        assert_eq!(s.average_downtime_minutes, 0);
        assert_eq!(s.longest_outage_minutes, 0);
        assert!(s.currently_down);
        assert_eq!(s.downtime_percentage, 0.0);
        assert_eq!(s.reliability_grade, "A+");
    }

    #[test]
    fn test_percentage_clamped_to_100() {
        // Duration longer than the elapsed window (clock skew between
        // report time and wall time) must clamp, not exceed 100.
        let ledger = Ledger {
            statuses: Default::default(),
            events: vec![closed_event("KXXX", T0, 600)],
        };

        let stats = station_stats(&ledger, T0 + 60 * MIN);
        assert_eq!(stats[0].downtime_percentage, 100.0);
        assert_eq!(stats[0].reliability_grade, "F");
    }

    #[test]
    fn test_ranked_by_total_downtime() {
        let ledger = Ledger {
            statuses: Default::default(),
            events: vec![
                closed_event("KAAA", T0, 10),
                closed_event("KBBB", T0, 200),
                closed_event("KCCC", T0, 50),
            ],
        };

        let stats = station_stats(&ledger, T0 + 1_000 * MIN);
        let order: Vec<&str> = stats.iter().map(|s| s.station_id.as_str()).collect();
        assert_eq!(order, vec!["KBBB", "KCCC", "KAAA"]);
    }

    #[test]
    fn test_station_name_taken_from_events() {
        let ledger = Ledger {
            statuses: Default::default(),
            events: vec![open_event("KXXX", T0), closed_event("KXXX", T0 - 60 * MIN, 5)],
        };

        let stats = station_stats(&ledger, T0);
        assert_eq!(stats[0].station_name.as_deref(), Some("KXXX Intl"));
    }
}
