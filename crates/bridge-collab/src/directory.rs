use async_trait::async_trait;
use serde_json::Value;

/// HTTP client for the upstream directory/trust service the discovery and
/// trust proxy endpoints forward to (§6.1, §6.4). The core only needs
/// typed-enough pass-through: responses are forwarded largely as-is.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn search_agents(&self, query: &str, min_trust: Option<f64>, max_price: Option<f64>, limit: Option<u32>) -> anyhow::Result<Value>;
    async fn search(&self, body: Value) -> anyhow::Result<Value>;
    async fn get_agent(&self, did: &str) -> anyhow::Result<Option<Value>>;
    async fn get_trust(&self, did: &str) -> anyhow::Result<Value>;
}

pub struct HttpDirectoryClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectoryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn search_agents(
        &self,
        query: &str,
        min_trust: Option<f64>,
        max_price: Option<f64>,
        limit: Option<u32>,
    ) -> anyhow::Result<Value> {
        let mut req = self
            .client
            .get(format!("{}/agents", self.base_url))
            .query(&[("q", query)]);
        if let Some(v) = min_trust {
            req = req.query(&[("minTrust", v)]);
        }
        if let Some(v) = max_price {
            req = req.query(&[("maxPrice", v)]);
        }
        if let Some(v) = limit {
            req = req.query(&[("limit", v)]);
        }
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn search(&self, body: Value) -> anyhow::Result<Value> {
        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    async fn get_agent(&self, did: &str) -> anyhow::Result<Option<Value>> {
        let resp = self
            .client
            .get(format!("{}/agents/{did}", self.base_url))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    async fn get_trust(&self, did: &str) -> anyhow::Result<Value> {
        let resp = self
            .client
            .get(format!("{}/trust/{did}", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}
