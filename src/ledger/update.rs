//! The per-station UP/DOWN state machine.

use tracing::info;

use super::types::{Ledger, MAX_EVENTS, OutageEvent, StationStatus, StatusSample};

/// Applies a batch of samples to the ledger, in input order.
///
/// Transitions are applied sample-by-sample, never first-vs-last: a batch
/// carrying several samples for one station replays every flip it contains.
/// `now_ms` stamps `last_seen_wall_clock_ms` only; event times always come
/// from the samples' own observation fields.
pub fn apply_samples(ledger: &mut Ledger, samples: &[StatusSample], now_ms: i64) {
    for sample in samples {
        apply_sample(ledger, sample, now_ms);
    }
    trim_events(ledger);
}

fn apply_sample(ledger: &mut Ledger, sample: &StatusSample, now_ms: i64) {
    let previous_flag = ledger
        .statuses
        .get(&sample.station_id)
        .map(|status| status.has_flag);

    match previous_flag {
        None => {
            // First sight of this station: register the status, open nothing.
            // A station already down at tracking start is invisible until the
            // outage resolves and a new one begins.
        }
        Some(false) if sample.has_flag => {
            if !ledger.has_open_event(&sample.station_id) {
                info!(
                    station = %sample.station_id,
                    zulu = %sample.observation_zulu,
                    "maintenance outage started"
                );
                ledger.events.push(OutageEvent {
                    station_id: sample.station_id.clone(),
                    station_name: sample.station_name.clone(),
                    start_epoch_ms: sample.observation_epoch_ms,
                    start_zulu: sample.observation_zulu.clone(),
                    end_epoch_ms: None,
                    end_zulu: None,
                    duration_minutes: None,
                });
            }
        }
        Some(true) if !sample.has_flag => {
            // The cold-start-down case leaves no open event to close; the
            // status update below still flips the station back to UP.
            if let Some(event) = ledger.open_event_mut(&sample.station_id) {
                event.end_epoch_ms = Some(sample.observation_epoch_ms);
                event.end_zulu = Some(sample.observation_zulu.clone());
                event.duration_minutes =
                    Some(duration_minutes(event.start_epoch_ms, sample.observation_epoch_ms));
                info!(
                    station = %sample.station_id,
                    duration_minutes = event.duration_minutes,
                    "maintenance outage ended"
                );
            }
        }
        Some(_) => {
            // No change: the status refresh below is the whole update.
        }
    }

    ledger.statuses.insert(
        sample.station_id.clone(),
        StationStatus {
            has_flag: sample.has_flag,
            last_seen_wall_clock_ms: now_ms,
            last_observation_epoch_ms: sample.observation_epoch_ms,
            last_observation_zulu: sample.observation_zulu.clone(),
            station_name: sample.station_name.clone(),
        },
    );
}

/// Minutes between two epoch-ms timestamps, rounded, floored at zero.
pub(crate) fn duration_minutes(start_ms: i64, end_ms: i64) -> i64 {
    (((end_ms - start_ms) as f64 / 60_000.0).round() as i64).max(0)
}

fn trim_events(ledger: &mut Ledger) {
    if ledger.events.len() > MAX_EVENTS {
        let excess = ledger.events.len() - MAX_EVENTS;
        ledger.events.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(station_id: &str, has_flag: bool, epoch_ms: i64, zulu: &str) -> StatusSample {
        StatusSample {
            station_id: station_id.to_string(),
            station_name: Some(format!("{station_id} Intl")),
            has_flag,
            observation_epoch_ms: epoch_ms,
            observation_zulu: zulu.to_string(),
        }
    }

    const T0: i64 = 1_754_580_000_000;
    const MIN: i64 = 60_000;

    #[test]
    fn test_down_up_cycle_produces_one_closed_event() {
        let mut ledger = Ledger::default();

        // [false, true, true, false] across four batches
        apply_samples(&mut ledger, &[sample("KXXX", false, T0, "071400Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", true, T0 + 60 * MIN, "071500Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", true, T0 + 120 * MIN, "071600Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", false, T0 + 180 * MIN, "071700Z")], T0);

        assert_eq!(ledger.events.len(), 1);
        let event = &ledger.events[0];
        assert_eq!(event.start_epoch_ms, T0 + 60 * MIN);
        assert_eq!(event.start_zulu, "071500Z");
        assert_eq!(event.end_epoch_ms, Some(T0 + 180 * MIN));
        assert_eq!(event.end_zulu.as_deref(), Some("071700Z"));
        assert_eq!(event.duration_minutes, Some(120));
        assert!(!ledger.statuses["KXXX"].has_flag);
    }

    #[test]
    fn test_two_cycles_produce_two_independent_events() {
        let mut ledger = Ledger::default();

        apply_samples(&mut ledger, &[sample("KXXX", false, T0, "071000Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", true, T0 + 10 * MIN, "071010Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", false, T0 + 40 * MIN, "071040Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", true, T0 + 100 * MIN, "071140Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", false, T0 + 190 * MIN, "071310Z")], T0);

        assert_eq!(ledger.events.len(), 2);
        assert_eq!(ledger.events[0].duration_minutes, Some(30));
        assert_eq!(ledger.events[1].duration_minutes, Some(90));
        assert!(ledger.events.iter().all(|e| !e.is_open()));
    }

    #[test]
    fn test_first_sight_down_opens_nothing() {
        let mut ledger = Ledger::default();

        apply_samples(&mut ledger, &[sample("KXXX", true, T0, "071000Z")], T0);
        assert!(ledger.events.is_empty());
        assert!(ledger.statuses["KXXX"].has_flag);

        // The resolving clear closes nothing (there is nothing open) but
        // flips the status back to UP.
        apply_samples(&mut ledger, &[sample("KXXX", false, T0 + 30 * MIN, "071030Z")], T0);
        assert!(ledger.events.is_empty());
        assert!(!ledger.statuses["KXXX"].has_flag);

        // The next flag is a real transition and opens an event.
        apply_samples(&mut ledger, &[sample("KXXX", true, T0 + 60 * MIN, "071100Z")], T0);
        assert_eq!(ledger.events.len(), 1);
        assert!(ledger.events[0].is_open());
    }

    #[test]
    fn test_multi_sample_batch_replays_every_transition() {
        let mut ledger = Ledger::default();
        apply_samples(&mut ledger, &[sample("KXXX", false, T0, "071000Z")], T0);

        // One batch carrying down-then-up must still record the cycle.
        apply_samples(
            &mut ledger,
            &[
                sample("KXXX", true, T0 + 5 * MIN, "071005Z"),
                sample("KXXX", false, T0 + 25 * MIN, "071025Z"),
            ],
            T0,
        );

        assert_eq!(ledger.events.len(), 1);
        assert_eq!(ledger.events[0].duration_minutes, Some(20));
        // Final status reflects the last sample in the batch.
        assert!(!ledger.statuses["KXXX"].has_flag);
    }

    #[test]
    fn test_at_most_one_open_event_per_station() {
        let mut ledger = Ledger::default();
        apply_samples(&mut ledger, &[sample("KXXX", false, T0, "071000Z")], T0);
        apply_samples(&mut ledger, &[sample("KXXX", true, T0 + MIN, "071001Z")], T0);

        // Force the stored status back to UP while the event stays open,
        // then flag again: the open event must be reused, not doubled.
        ledger.statuses.get_mut("KXXX").unwrap().has_flag = false;
        apply_samples(&mut ledger, &[sample("KXXX", true, T0 + 2 * MIN, "071002Z")], T0);

        assert_eq!(ledger.events.iter().filter(|e| e.is_open()).count(), 1);
    }

    #[test]
    fn test_duration_clamped_to_zero() {
        assert_eq!(duration_minutes(T0, T0 - 5 * MIN), 0);
        assert_eq!(duration_minutes(T0, T0), 0);
        assert_eq!(duration_minutes(T0, T0 + 90_000), 2); // 1.5 min rounds up
    }

    #[test]
    fn test_retention_drops_oldest_first() {
        let mut ledger = Ledger::default();

        // 501 closed cycles for distinct pseudo-stations, two samples each.
        for i in 0..501 {
            let id = format!("K{i:03}");
            let t = T0 + i as i64 * 10 * MIN;
            apply_samples(&mut ledger, &[sample(&id, false, t, "")], T0);
            apply_samples(&mut ledger, &[sample(&id, true, t + MIN, "")], T0);
            apply_samples(&mut ledger, &[sample(&id, false, t + 2 * MIN, "")], T0);
            apply_samples(&mut ledger, &[sample(&id, true, t + 3 * MIN, "")], T0);
        }

        // 1002 events appended, capped to the newest 1000 in order: K000's
        // pair fell off the front, K500's open event is last.
        assert_eq!(ledger.events.len(), MAX_EVENTS);
        assert_eq!(ledger.events[0].station_id, "K001");
        assert!(!ledger.events[0].is_open());
        assert_eq!(ledger.events[MAX_EVENTS - 1].station_id, "K500");
        assert!(ledger.events[MAX_EVENTS - 1].is_open());
    }
}
