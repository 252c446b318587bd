use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decoder::{FlightCategory, Observation, ReportKind};

/// Flat summary of one nationwide sweep cycle, appended as a CSV row.
#[derive(Debug, Default, Serialize)]
pub struct CycleStats {
    pub timestamp: DateTime<Utc>,
    pub stations: usize,
    pub partitions_failed: usize,

    // report kinds
    pub metar: usize,
    pub speci: usize,

    // flight categories
    pub vfr: usize,
    pub mvfr: usize,
    pub ifr: usize,
    pub lifr: usize,

    // maintenance
    pub maintenance_flagged: usize,

    // decoded-field support
    pub with_wind: usize,
    pub with_gust: usize,
    pub with_temperature: usize,
    pub with_dewpoint: usize,
    pub with_altimeter: usize,
    pub with_clouds: usize,
    pub with_wx: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl CycleStats {
    pub fn from_observations(observations: &[Observation]) -> Self {
        let mut s = CycleStats {
            timestamp: Utc::now(),
            stations: observations.len(),
            ..Default::default()
        };

        for obs in observations {
            match obs.report_kind {
                ReportKind::Metar => s.metar += 1,
                ReportKind::Speci => s.speci += 1,
            }

            match obs.flight_category {
                FlightCategory::Vfr => s.vfr += 1,
                FlightCategory::Mvfr => s.mvfr += 1,
                FlightCategory::Ifr => s.ifr += 1,
                FlightCategory::Lifr => s.lifr += 1,
            }

            if obs.has_maintenance_flag {
                s.maintenance_flagged += 1;
            }

            if obs.wind_speed_kt.is_some() {
                s.with_wind += 1;
            }

            if obs.wind_gust_kt.is_some() {
                s.with_gust += 1;
            }

            if obs.temperature_c.is_some() {
                s.with_temperature += 1;
            }

            if obs.dewpoint_c.is_some() {
                s.with_dewpoint += 1;
            }

            if obs.altimeter_in_hg.is_some() {
                s.with_altimeter += 1;
            }

            if !obs.clouds.is_empty() {
                s.with_clouds += 1;
            }

            if !obs.weather_phenomena.is_empty() {
                s.with_wx += 1;
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn flagged_pct(&self) -> f64 {
        Self::pct(self.maintenance_flagged, self.stations)
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        CycleStats {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Set the number of partitions that contributed nothing to this cycle.
    pub fn with_partition_failures(mut self, partitions_failed: usize) -> Self {
        self.partitions_failed = partitions_failed;
        self
    }
}
