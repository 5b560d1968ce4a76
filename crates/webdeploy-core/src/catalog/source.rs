//! Version-check endpoint access.

use std::time::Duration;

use anyhow::Context;
use serde_json::Value;

use crate::runtime::block_on;

/// Source of the latest-release document.
pub trait VersionSource: Send + Sync {
    /// Fetch the raw JSON document describing the latest release.
    fn fetch_latest(&self) -> anyhow::Result<Value>;
}

/// Unauthenticated HTTPS GET against a version-check endpoint.
#[derive(Debug, Clone)]
pub struct HttpVersionSource {
    url: String,
    timeout: Duration,
}

impl HttpVersionSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> anyhow::Result<Value> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("webdeploy/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch release data from {}", self.url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Failed to fetch release data: HTTP {} from {}",
                response.status(),
                self.url
            );
        }

        response
            .json()
            .await
            .context("Failed to parse release data response")
    }
}

impl VersionSource for HttpVersionSource {
    fn fetch_latest(&self) -> anyhow::Result<Value> {
        block_on(self.fetch())?
    }
}
