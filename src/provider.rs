//! Trait for the upstream aviation weather data source.

use anyhow::Result;
use serde_json::Value;

/// Abstraction over a query-by-station-or-partition weather endpoint.
///
/// Records cross this seam as raw JSON values; validation into
/// [`crate::decoder::Observation`] happens in the decoder so that a malformed
/// record costs one dropped row, not a failed fetch.
#[async_trait::async_trait]
pub trait WeatherApi: Send + Sync {
    /// Returns the most recent reports for every station in a state
    /// partition (e.g. `"IL"`), within the given recency window in hours.
    async fn metars_for_state(&self, state: &str, hours: f64) -> Result<Vec<Value>>;

    /// Returns the most recent reports for an explicit station id list.
    async fn metars_for_ids(&self, ids: &[String], hours: f64) -> Result<Vec<Value>>;
}
