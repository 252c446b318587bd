//! aviationweather.gov data API client.
//!
//! The data API is unauthenticated. Reports come back as a JSON array of
//! station records; `ids` accepts either a comma-separated id list or a
//! `@XX` state code, and `hours` bounds the recency window.

use anyhow::{Context, Result};
use serde_json::Value;

use metar_watch::fetch::{BasicClient, HttpClient, fetch_bytes};
use metar_watch::provider::WeatherApi;

const AWC_BASE_URL: &str = "https://aviationweather.gov/api/data";

pub struct AwcClient<C = BasicClient> {
    http: C,
    base_url: String,
}

impl AwcClient<BasicClient> {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: BasicClient::new()?,
            base_url: AWC_BASE_URL.to_string(),
        })
    }
}

impl<C: HttpClient> AwcClient<C> {
    async fn metars(&self, ids: &str, hours: f64) -> Result<Vec<Value>> {
        let url = format!(
            "{}/metar?ids={}&format=json&hours={}",
            self.base_url, ids, hours
        );

        let bytes = fetch_bytes(&self.http, &url).await?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("AWC response for '{ids}' is not a JSON record array"))
    }
}

#[async_trait::async_trait]
impl<C: HttpClient> WeatherApi for AwcClient<C> {
    async fn metars_for_state(&self, state: &str, hours: f64) -> Result<Vec<Value>> {
        self.metars(&format!("@{state}"), hours).await
    }

    async fn metars_for_ids(&self, ids: &[String], hours: f64) -> Result<Vec<Value>> {
        self.metars(&ids.join(","), hours).await
    }
}
