use crate::models::{CacheEntry, JobRequest};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload<'a> {
    pub result: &'a CacheEntry,
    pub originating_request: &'a JobRequest,
}

/// Hands a successful recognition to the downstream analysis service.
#[async_trait]
pub trait ResultAnalyzer: Send + Sync {
    async fn analyze(&self, result: &CacheEntry, request: &JobRequest) -> Result<()>;
}

pub struct HttpAnalyzer {
    client: Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for analysis")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ResultAnalyzer for HttpAnalyzer {
    async fn analyze(&self, result: &CacheEntry, request: &JobRequest) -> Result<()> {
        let payload = AnalysisPayload {
            result,
            originating_request: request,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .context(format!("failed to POST to {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("analysis API returned {}: {}", status, body.trim());
        }
        Ok(())
    }
}
