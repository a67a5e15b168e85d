use async_trait::async_trait;
use reqwest::{Request, Response};

/// Sends a prepared request. The freshness lookup only ever goes through
/// this trait, so callers can swap the transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
