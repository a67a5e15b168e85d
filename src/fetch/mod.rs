mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client
        .execute(req)
        .await
        .with_context(|| format!("GET {url} failed"))?
        .error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

pub async fn fetch_text<C: HttpClient>(client: &C, url: &str) -> Result<String> {
    let bytes = fetch_bytes(client, url).await?;
    String::from_utf8(bytes).with_context(|| format!("response from {url} is not UTF-8"))
}
