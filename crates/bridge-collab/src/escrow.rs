use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use bridge_core::constants::{
    ESCROW_CONFIRM_BACKOFF_MULTIPLIER, ESCROW_CONFIRM_BASE_BACKOFF_SECONDS,
    ESCROW_CONFIRM_MAX_ATTEMPTS,
};
use bridge_core::EscrowRef;

/// Result of `EscrowClient::validate` (§6.4).
#[derive(Debug, Clone)]
pub struct ValidateOutcome {
    pub valid: bool,
    pub reason: Option<String>,
}

/// The on-chain custody collaborator the bridge consumes but never
/// implements the cryptography of (§1 non-goals, §6.4).
#[async_trait]
pub trait EscrowClient: Send + Sync {
    async fn validate(&self, escrow_ref: &EscrowRef, provider_identity: &str) -> anyhow::Result<ValidateOutcome>;
    async fn confirm_delivery(&self, escrow_ref: &EscrowRef, output_hash: &str) -> anyhow::Result<String>;
}

/// JSON-RPC-ish HTTP escrow client talking to the configured `rpc_url`.
pub struct HttpEscrowClient {
    rpc_url: String,
    address: String,
    client: reqwest::Client,
}

impl HttpEscrowClient {
    pub fn new(rpc_url: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            address: address.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        #[derive(Deserialize)]
        struct Envelope {
            result: Option<serde_json::Value>,
            error: Option<serde_json::Value>,
        }

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await?
            .json::<Envelope>()
            .await?;

        if let Some(err) = resp.error {
            anyhow::bail!("escrow RPC error: {err}");
        }
        resp.result.ok_or_else(|| anyhow::anyhow!("escrow RPC returned no result"))
    }
}

#[async_trait]
impl EscrowClient for HttpEscrowClient {
    async fn validate(&self, escrow_ref: &EscrowRef, provider_identity: &str) -> anyhow::Result<ValidateOutcome> {
        let result = self
            .call(
                "escrow_validate",
                serde_json::json!({
                    "escrowRef": escrow_ref.0,
                    "contract": self.address,
                    "provider": provider_identity,
                }),
            )
            .await?;

        Ok(ValidateOutcome {
            valid: result["valid"].as_bool().unwrap_or(false),
            reason: result["reason"].as_str().map(str::to_string),
        })
    }

    async fn confirm_delivery(&self, escrow_ref: &EscrowRef, output_hash: &str) -> anyhow::Result<String> {
        let mut attempt = 0;
        let mut backoff = Duration::from_secs(ESCROW_CONFIRM_BASE_BACKOFF_SECONDS);

        loop {
            attempt += 1;
            let result = self
                .call(
                    "escrow_confirmDelivery",
                    serde_json::json!({
                        "escrowRef": escrow_ref.0,
                        "contract": self.address,
                        "outputHash": output_hash,
                    }),
                )
                .await;

            match result {
                Ok(value) => {
                    return Ok(value["txRef"].as_str().unwrap_or_default().to_string());
                }
                Err(err) if attempt < ESCROW_CONFIRM_MAX_ATTEMPTS => {
                    warn!(attempt, %err, "escrow delivery confirmation failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= ESCROW_CONFIRM_BACKOFF_MULTIPLIER as u32;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Used when no escrow collaborator is configured: any submission carrying
/// an `escrow_ref` would never reach this client, since C2 only invokes
/// the escrow gate when one is configured (§4.2 step 6).
pub struct NullEscrowClient;

#[async_trait]
impl EscrowClient for NullEscrowClient {
    async fn validate(&self, _escrow_ref: &EscrowRef, _provider_identity: &str) -> anyhow::Result<ValidateOutcome> {
        Ok(ValidateOutcome {
            valid: true,
            reason: None,
        })
    }

    async fn confirm_delivery(&self, _escrow_ref: &EscrowRef, _output_hash: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_client_always_validates() {
        let client = NullEscrowClient;
        let outcome = client
            .validate(&EscrowRef::parse("1").unwrap(), "did:x")
            .await
            .unwrap();
        assert!(outcome.valid);
    }
}
