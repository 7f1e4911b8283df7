//! Thin JSON-RPC 2.0 client for talking to a running bridge-node.

use anyhow::{bail, Context};
use serde_json::{json, Value};

pub struct BridgeRpcClient {
    url: String,
    client: reqwest::Client,
    bearer: Option<String>,
}

impl BridgeRpcClient {
    pub fn new(url: &str, bearer: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            bearer,
        }
    }

    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut req = self.client.post(&self.url).json(&envelope);
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("calling {method} at {}", self.url))?;
        let body: Value = resp.json().await.context("parsing JSON-RPC response")?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            bail!("{method} failed: {message}");
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("{method} response missing \"result\""))
    }

    pub async fn message_send(&self, prompt: &str) -> anyhow::Result<Value> {
        self.call(
            "message/send",
            json!({
                "message": { "parts": [{ "type": "text", "text": prompt }] },
            }),
        )
        .await
    }

    pub async fn tasks_get(&self, task_id: &str) -> anyhow::Result<Value> {
        self.call("tasks/get", json!({ "taskId": task_id })).await
    }

    pub async fn tasks_cancel(&self, task_id: &str) -> anyhow::Result<Value> {
        self.call("tasks/cancel", json!({ "taskId": task_id })).await
    }

    pub async fn agent_describe(&self) -> anyhow::Result<Value> {
        self.call("agent/describe", json!({})).await
    }

    pub async fn agent_status(&self) -> anyhow::Result<Value> {
        self.call("agent/status", json!({})).await
    }
}
