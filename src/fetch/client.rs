use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam between the pipeline and the network, so request-level behavior can
/// be swapped in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
