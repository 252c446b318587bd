use std::time::Duration;

use super::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;

/// Plain [`HttpClient`] over a pooled `reqwest::Client`.
///
/// Every request carries a bounded timeout; a hung upstream surfaces as a
/// partition failure rather than stalling a sweep.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self(client))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
