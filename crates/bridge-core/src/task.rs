use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::{
    MAX_CONTEXT_FILES, MAX_PROMPT_BYTES, MAX_TASK_ID_LEN, MAX_TIMEOUT_SECONDS, MIN_TIMEOUT_SECONDS,
};
use crate::error::BridgeError;

/// Opaque escrow handle (§3): a decimal-string-encoded integer, accepted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EscrowRef(pub String);

impl EscrowRef {
    pub fn parse(s: &str) -> Result<Self, BridgeError> {
        if s.parse::<u128>().is_err() {
            return Err(BridgeError::validation(
                "escrow_ref",
                "must be a decimal-encoded non-negative integer",
            ));
        }
        Ok(Self(s.to_string()))
    }
}

/// The small enumerated set of task kinds the executor understands (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    Prompt,
    CodeReview,
    Translation,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Prompt => "prompt",
            TaskKind::CodeReview => "code-review",
            TaskKind::Translation => "translation",
        }
    }
}

/// Working-directory hint plus referenced file list (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Context {
    pub working_dir: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Context {
    /// Resolve `working_dir` against `sandbox_root`, rejecting anything that
    /// would canonicalize outside of it.
    fn canonicalize_under(&self, sandbox_root: &Path) -> Result<Option<PathBuf>, BridgeError> {
        let Some(wd) = &self.working_dir else {
            return Ok(None);
        };
        let candidate = sandbox_root.join(wd);
        let canon = candidate.canonicalize().map_err(|_| {
            BridgeError::validation("context.working_dir", "path does not exist")
        })?;
        let root_canon = sandbox_root.canonicalize().map_err(|_| {
            BridgeError::validation("context.working_dir", "sandbox root is not accessible")
        })?;
        if !canon.starts_with(&root_canon) {
            return Err(BridgeError::validation(
                "context.working_dir",
                "must canonicalize to a descendant of the sandbox root",
            ));
        }
        Ok(Some(canon))
    }
}

/// Canonical, protocol-agnostic task description (§3, §4.1 "normalization").
/// Immutable once admitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSubmission {
    #[serde(default)]
    pub task_id: String,
    pub kind: TaskKind,
    pub prompt: String,
    #[serde(default)]
    pub client_identity: String,
    #[serde(default)]
    pub context: Option<Context>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub escrow_ref: Option<EscrowRef>,
}

fn default_timeout() -> u32 {
    crate::constants::DEFAULT_TIMEOUT_SECONDS
}

impl TaskSubmission {
    /// Auto-generate a task id in the documented shape: `task-{unix-ns}-{hex}`.
    pub fn generate_task_id() -> String {
        let ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let mut suffix = [0u8; 4];
        rand::Rng::fill(&mut rand::thread_rng(), &mut suffix);
        format!("task-{ns}-{}", hex::encode(suffix))
    }

    /// Validate every field bound from §3. Does not check serialized-size
    /// (the transport layer enforces that, §4.2 step 1) or sandbox context
    /// unless `sandbox_root` is given.
    pub fn validate(&self, sandbox_root: Option<&Path>) -> Result<(), BridgeError> {
        if self.task_id.is_empty()
            || self.task_id.len() > MAX_TASK_ID_LEN
            || !self
                .task_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
        {
            return Err(BridgeError::validation(
                "task_id",
                "must match [A-Za-z0-9._-]+ and be <=128 chars",
            ));
        }

        if self.prompt.is_empty() {
            return Err(BridgeError::validation("prompt", "must be non-empty"));
        }
        if self.prompt.len() > MAX_PROMPT_BYTES {
            return Err(BridgeError::validation(
                "prompt",
                format!("must be <= {MAX_PROMPT_BYTES} bytes"),
            ));
        }

        if self.timeout_seconds < MIN_TIMEOUT_SECONDS || self.timeout_seconds > MAX_TIMEOUT_SECONDS
        {
            return Err(BridgeError::validation(
                "timeout_seconds",
                format!("must be between {MIN_TIMEOUT_SECONDS} and {MAX_TIMEOUT_SECONDS}"),
            ));
        }

        if let Some(ctx) = &self.context {
            if ctx.files.len() > MAX_CONTEXT_FILES {
                return Err(BridgeError::validation(
                    "context.files",
                    format!("must have <= {MAX_CONTEXT_FILES} entries"),
                ));
            }
            if let Some(root) = sandbox_root {
                ctx.canonicalize_under(root)?;
            }
        }

        Ok(())
    }
}

/// Terminal task outcome (§3, §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeout => "timeout",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

/// Stored terminal record (§3). `output` has already been truncated to the
/// caller's effective output cap by the time it reaches the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub expires_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_submission() -> TaskSubmission {
        TaskSubmission {
            task_id: "t1".into(),
            kind: TaskKind::Prompt,
            prompt: "hi".into(),
            client_identity: "did:x".into(),
            context: None,
            timeout_seconds: 300,
            escrow_ref: None,
        }
    }

    #[test]
    fn rejects_oversize_prompt() {
        let mut sub = base_submission();
        sub.prompt = "a".repeat(MAX_PROMPT_BYTES + 1);
        assert!(sub.validate(None).is_err());
    }

    #[test]
    fn rejects_bad_task_id() {
        let mut sub = base_submission();
        sub.task_id = "bad id!".into();
        assert!(sub.validate(None).is_err());
    }

    #[test]
    fn rejects_timeout_out_of_range() {
        let mut sub = base_submission();
        sub.timeout_seconds = 0;
        assert!(sub.validate(None).is_err());
        sub.timeout_seconds = 99999;
        assert!(sub.validate(None).is_err());
    }

    #[test]
    fn accepts_well_formed_submission() {
        assert!(base_submission().validate(None).is_ok());
    }

    #[test]
    fn escrow_ref_must_be_decimal() {
        assert!(EscrowRef::parse("99").is_ok());
        assert!(EscrowRef::parse("abc").is_err());
    }

    #[test]
    fn generated_task_id_matches_shape() {
        let id = TaskSubmission::generate_task_id();
        assert!(id.starts_with("task-"));
    }
}
