mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, bail};

/// Issues a GET through `client` and returns the body bytes.
///
/// Non-2xx statuses are errors; callers decide whether that fails a whole
/// operation or just one partition.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if !resp.status().is_success() {
        bail!("GET {url} returned status {}", resp.status());
    }
    Ok(resp.bytes().await?.to_vec())
}
