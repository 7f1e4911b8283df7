//! In-memory fakes for the three collaborator traits (§9 "mock-friendly
//! collaborators"). Used by gateway/node integration tests.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use bridge_core::{EscrowRef, TaskStatus, TaskSubmission};

use crate::directory::DirectoryClient;
use crate::escrow::{EscrowClient, ValidateOutcome};
use crate::executor::{Executor, ExecutionResult};

/// Always echoes the prompt back as the output, after an optional fixed
/// delay — useful for exercising the sync/async resolver's deadline.
pub struct EchoExecutor {
    pub delay: Option<std::time::Duration>,
    cancelled: Mutex<std::collections::HashSet<String>>,
}

impl EchoExecutor {
    pub fn new() -> Self {
        Self {
            delay: None,
            cancelled: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn with_delay(delay: std::time::Duration) -> Self {
        Self {
            delay: Some(delay),
            cancelled: Mutex::new(std::collections::HashSet::new()),
        }
    }
}

impl Default for EchoExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, submission: &TaskSubmission) -> anyhow::Result<ExecutionResult> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.cancelled.lock().await.remove(&submission.task_id) {
            return Ok(ExecutionResult {
                status: TaskStatus::Cancelled,
                output: None,
                error: None,
                duration_ms: 0,
            });
        }
        Ok(ExecutionResult {
            status: TaskStatus::Completed,
            output: Some(submission.prompt.clone()),
            error: None,
            duration_ms: 1,
        })
    }

    async fn cancel(&self, task_id: &str) -> anyhow::Result<bool> {
        self.cancelled.lock().await.insert(task_id.to_string());
        Ok(true)
    }
}

/// Validates and confirms every escrow call unconditionally, or with a
/// configured fixed rejection reason.
pub struct FakeEscrowClient {
    pub reject_reason: Option<String>,
}

impl FakeEscrowClient {
    pub fn accepting() -> Self {
        Self { reject_reason: None }
    }

    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            reject_reason: Some(reason.into()),
        }
    }
}

#[async_trait]
impl EscrowClient for FakeEscrowClient {
    async fn validate(&self, _escrow_ref: &EscrowRef, _provider_identity: &str) -> anyhow::Result<ValidateOutcome> {
        match &self.reject_reason {
            Some(reason) => Ok(ValidateOutcome {
                valid: false,
                reason: Some(reason.clone()),
            }),
            None => Ok(ValidateOutcome {
                valid: true,
                reason: None,
            }),
        }
    }

    async fn confirm_delivery(&self, _escrow_ref: &EscrowRef, _output_hash: &str) -> anyhow::Result<String> {
        Ok("fake-tx-ref".to_string())
    }
}

pub struct FakeDirectoryClient;

#[async_trait]
impl DirectoryClient for FakeDirectoryClient {
    async fn search_agents(&self, _query: &str, _min_trust: Option<f64>, _max_price: Option<f64>, _limit: Option<u32>) -> anyhow::Result<Value> {
        Ok(serde_json::json!({ "agents": [], "source": "fake" }))
    }

    async fn search(&self, _body: Value) -> anyhow::Result<Value> {
        Ok(serde_json::json!({ "agents": [], "source": "fake" }))
    }

    async fn get_agent(&self, _did: &str) -> anyhow::Result<Option<Value>> {
        Ok(None)
    }

    async fn get_trust(&self, did: &str) -> anyhow::Result<Value> {
        Ok(serde_json::json!({ "local": null, "network": null, "did": did }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::TaskKind;

    fn submission() -> TaskSubmission {
        TaskSubmission {
            task_id: "t1".into(),
            kind: TaskKind::Prompt,
            prompt: "hello".into(),
            client_identity: "did:x".into(),
            context: None,
            timeout_seconds: 60,
            escrow_ref: None,
        }
    }

    #[tokio::test]
    async fn echo_executor_returns_prompt_as_output() {
        let exec = EchoExecutor::new();
        let result = exec.execute(&submission()).await.unwrap();
        assert_eq!(result.output.as_deref(), Some("hello"));
        assert_eq!(result.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn rejecting_escrow_client_surfaces_reason() {
        let client = FakeEscrowClient::rejecting("AWAITING_DEPOSIT");
        let outcome = client
            .validate(&EscrowRef::parse("99").unwrap(), "did:x")
            .await
            .unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.reason.as_deref(), Some("AWAITING_DEPOSIT"));
    }
}
