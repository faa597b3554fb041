use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Retrieves the raw bytes behind an image reference.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for image fetch")?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .context("failed to make HTTP GET request")?;

        let status = response.status();
        if status != StatusCode::OK {
            bail!("bad status code: {}", status);
        }
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                bail!("image is {} bytes, limit is {}", length, self.max_bytes);
            }
        }

        // Content-Length can be absent or wrong, so the cap is enforced while reading
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .context("failed to read image content from response body")?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_bytes {
                bail!("image exceeds the {} byte limit", self.max_bytes);
            }
        }
        Ok(body)
    }
}
