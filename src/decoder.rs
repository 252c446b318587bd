//! METAR/SPECI record decoding.
//!
//! Turns one raw aviationweather.gov JSON record into a normalized
//! [`Observation`]: unit conversions, flight-category derivation, and the
//! trailing-`$` maintenance flag the outage ledger keys on.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Flight category derived from ceiling and visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightCategory {
    #[serde(rename = "VFR")]
    Vfr,
    #[serde(rename = "MVFR")]
    Mvfr,
    #[serde(rename = "IFR")]
    Ifr,
    #[serde(rename = "LIFR")]
    Lifr,
}

impl std::fmt::Display for FlightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlightCategory::Vfr => write!(f, "VFR"),
            FlightCategory::Mvfr => write!(f, "MVFR"),
            FlightCategory::Ifr => write!(f, "IFR"),
            FlightCategory::Lifr => write!(f, "LIFR"),
        }
    }
}

/// Routine vs. special report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    #[serde(rename = "METAR")]
    Metar,
    #[serde(rename = "SPECI")]
    Speci,
}

/// One reported cloud layer, in the order it appears in the raw text.
///
/// Layer order is whatever the station reported. Lowest-first is common but
/// not guaranteed, so ceiling derivation scans every layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudLayer {
    pub cover: String,
    pub base_feet: Option<i32>,
}

/// A normalized surface observation for one station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub station_id: String,
    pub raw_text: String,
    pub station_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation_m: Option<f64>,
    pub observed_at_iso: Option<String>,
    /// The `DDHHMMZ` token from the raw text; empty when the report carries
    /// none. Never synthesized from wall-clock time.
    pub observation_zulu: String,
    /// Authoritative event time for outage bookkeeping. Falls back to
    /// wall-clock "now" only when the provider's numeric timestamp is absent.
    pub observation_epoch_ms: i64,
    /// `None` encodes variable or calm wind.
    pub wind_direction_deg: Option<u16>,
    pub wind_speed_kt: Option<u16>,
    pub wind_gust_kt: Option<u16>,
    /// Defaults to 10: visibility is >= 10 SM unless the report states less.
    pub visibility_sm: f64,
    pub temperature_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    pub altimeter_in_hg: Option<f64>,
    pub flight_category: FlightCategory,
    pub clouds: Vec<CloudLayer>,
    /// Raw phenomenon tokens as reported (`-RA`, `BR`, ...). Display decoding
    /// is lossy; this field round-trips.
    pub weather_phenomena: Vec<String>,
    pub has_maintenance_flag: bool,
    pub report_kind: ReportKind,
}

impl Observation {
    /// Display-only Fahrenheit rendering of the temperature.
    pub fn temperature_f(&self) -> Option<i32> {
        self.temperature_c.map(celsius_to_fahrenheit)
    }
}

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * 0.3048
}

pub fn hpa_to_in_hg(hpa: f64) -> f64 {
    hpa / 33.8639
}

pub fn celsius_to_fahrenheit(c: f64) -> i32 {
    (c * 9.0 / 5.0 + 32.0).round() as i32
}

/// Lowest broken-or-worse cloud base, in feet. `None` means unlimited.
pub fn ceiling_feet(clouds: &[CloudLayer]) -> Option<i32> {
    clouds
        .iter()
        .filter(|layer| matches!(layer.cover.as_str(), "BKN" | "OVC" | "VV"))
        .filter_map(|layer| layer.base_feet)
        .min()
}

/// Classifies ceiling/visibility into a flight category.
///
/// Checked in order, first match wins. The MVFR visibility bound is
/// inclusive (`<= 5`) while the IFR/LIFR bounds are strict: exactly 5 SM
/// under a high ceiling is MVFR, not VFR.
pub fn classify_flight_category(ceiling_ft: Option<i32>, visibility_sm: f64) -> FlightCategory {
    let ceiling = ceiling_ft.map(f64::from).unwrap_or(f64::INFINITY);

    if ceiling < 500.0 || visibility_sm < 1.0 {
        FlightCategory::Lifr
    } else if ceiling < 1000.0 || visibility_sm < 3.0 {
        FlightCategory::Ifr
    } else if ceiling < 3000.0 || visibility_sm <= 5.0 {
        FlightCategory::Mvfr
    } else {
        FlightCategory::Vfr
    }
}

/// Extracts the first `DDHHMMZ` observation-time token from raw report text.
///
/// Returns an empty string when no token is present; the caller must not
/// substitute wall-clock time for this field.
pub fn observation_zulu(raw_text: &str) -> String {
    raw_text
        .split_whitespace()
        .find(|token| {
            token.len() == 7
                && token.ends_with('Z')
                && token.as_bytes()[..6].iter().all(u8::is_ascii_digit)
        })
        .map(str::to_string)
        .unwrap_or_default()
}

/// True iff the trimmed raw text ends with `$`, the ASOS maintenance-check
/// indicator. No other encoding is recognized.
pub fn has_maintenance_flag(raw_text: &str) -> bool {
    raw_text.trim().ends_with('$')
}

/// Two-letter METAR phenomenon codes and their plain-language meanings.
static WX_CODES: &[(&str, &str)] = &[
    ("BC", "patches"),
    ("BL", "blowing"),
    ("BR", "mist"),
    ("DR", "low drifting"),
    ("DS", "duststorm"),
    ("DU", "dust"),
    ("DZ", "drizzle"),
    ("FC", "funnel cloud"),
    ("FG", "fog"),
    ("FU", "smoke"),
    ("FZ", "freezing"),
    ("GR", "hail"),
    ("GS", "small hail"),
    ("HZ", "haze"),
    ("IC", "ice crystals"),
    ("MI", "shallow"),
    ("PL", "ice pellets"),
    ("PO", "dust whirls"),
    ("PR", "partial"),
    ("RA", "rain"),
    ("SA", "sand"),
    ("SG", "snow grains"),
    ("SH", "showers"),
    ("SN", "snow"),
    ("SQ", "squalls"),
    ("SS", "sandstorm"),
    ("TS", "thunderstorm"),
    ("UP", "unknown precipitation"),
    ("VA", "volcanic ash"),
    ("VC", "nearby"),
];

/// Decodes one phenomenon token (`-TSRA`, `BR`, ...) into plain language.
///
/// A leading `-`/`+` intensity marker becomes "light"/"heavy"; the remainder
/// is read as consecutive two-letter codes. Unrecognized codes are dropped
/// from the decoded string; the raw token survives in
/// [`Observation::weather_phenomena`].
pub fn decode_wx_token(token: &str) -> String {
    let (intensity, codes) = if let Some(rest) = token.strip_prefix('-') {
        (Some("light"), rest)
    } else if let Some(rest) = token.strip_prefix('+') {
        (Some("heavy"), rest)
    } else {
        (None, token)
    };

    let mut words: Vec<&str> = Vec::new();
    if let Some(word) = intensity {
        words.push(word);
    }

    let mut rest = codes;
    while rest.len() >= 2 {
        let (code, tail) = rest.split_at(2);
        if let Some((_, meaning)) = WX_CODES.iter().find(|(c, _)| *c == code) {
            words.push(meaning);
        }
        rest = tail;
    }

    words.join(" ")
}

/// Decodes a whole `wxString` for display, one phrase per token.
pub fn decode_wx_string(wx_string: &str) -> String {
    wx_string
        .split_whitespace()
        .map(decode_wx_token)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decodes one provider record into an [`Observation`].
///
/// Returns `None` when the record carries no usable station id; every other
/// missing or malformed field degrades to a default.
pub fn decode_record(record: &Value) -> Option<Observation> {
    let station_id = record["icaoId"].as_str().filter(|id| !id.is_empty())?.to_string();

    let raw_text = record["rawOb"].as_str().unwrap_or("").to_string();
    let clouds = decode_clouds(&record["clouds"]);
    let visibility_sm = decode_visibility(&record["visib"]);

    let observation_epoch_ms = record["obsTime"]
        .as_i64()
        .map(|seconds| seconds * 1000)
        .unwrap_or_else(|| Utc::now().timestamp_millis());

    // Station elevation arrives in meters on the data API; a handful of
    // metadata endpoints report feet instead.
    let elevation_m = record["elev"]
        .as_f64()
        .or_else(|| record["elevFt"].as_f64().map(feet_to_meters));

    // Altimeter values above 100 can only be hectopascals; inches of
    // mercury top out near 32.
    let altimeter_in_hg = record["altim"]
        .as_f64()
        .map(|v| if v > 100.0 { hpa_to_in_hg(v) } else { v });

    let report_kind = match record["metarType"].as_str() {
        Some("SPECI") => ReportKind::Speci,
        _ => ReportKind::Metar,
    };

    let weather_phenomena = record["wxString"]
        .as_str()
        .map(|wx| wx.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Some(Observation {
        observation_zulu: observation_zulu(&raw_text),
        has_maintenance_flag: has_maintenance_flag(&raw_text),
        flight_category: classify_flight_category(ceiling_feet(&clouds), visibility_sm),
        station_id,
        station_name: record["name"].as_str().map(str::to_string),
        latitude: record["lat"].as_f64(),
        longitude: record["lon"].as_f64(),
        elevation_m,
        observed_at_iso: record["reportTime"].as_str().map(str::to_string),
        observation_epoch_ms,
        wind_direction_deg: record["wdir"].as_u64().map(|deg| deg as u16),
        wind_speed_kt: record["wspd"].as_u64().map(|kt| kt as u16),
        wind_gust_kt: record["wgst"].as_u64().map(|kt| kt as u16),
        visibility_sm,
        temperature_c: record["temp"].as_f64(),
        dewpoint_c: record["dewp"].as_f64(),
        altimeter_in_hg,
        clouds,
        weather_phenomena,
        raw_text,
        report_kind,
    })
}

/// Decodes a batch of provider records, dropping the unusable ones.
pub fn decode_records(records: &[Value]) -> Vec<Observation> {
    records
        .iter()
        .filter_map(|record| {
            let decoded = decode_record(record);
            if decoded.is_none() {
                debug!(?record, "dropping record with no station id");
            }
            decoded
        })
        .collect()
}

fn decode_clouds(clouds: &Value) -> Vec<CloudLayer> {
    clouds
        .as_array()
        .map(|layers| {
            layers
                .iter()
                .map(|layer| CloudLayer {
                    cover: layer["cover"].as_str().unwrap_or("").to_string(),
                    base_feet: layer["base"].as_i64().map(|base| base as i32),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Coerces the provider's visibility field to statute miles.
///
/// The data API reports either a number or a string like `"10+"`. Anything
/// non-numeric falls back to 10 SM.
fn decode_visibility(visib: &Value) -> f64 {
    if let Some(miles) = visib.as_f64() {
        return miles;
    }
    if let Some(text) = visib.as_str() {
        if let Ok(miles) = text.trim_end_matches('+').trim().parse::<f64>() {
            return miles;
        }
    }
    10.0
}
