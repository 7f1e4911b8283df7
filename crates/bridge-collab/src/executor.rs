use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{info, warn};

use bridge_core::{TaskStatus, TaskSubmission};

/// Outcome of a single executor invocation (§4.4, §6.4). Never an `Err` —
/// an executor-side failure is still a terminal result, just with
/// `status:"failed"` and `error` populated; only infrastructure problems
/// (the subprocess can't even start) produce a genuine `Err`.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: TaskStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// The external agent the bridge dispatches admitted tasks to (§6.4).
/// Mock-friendly by design: tests substitute `InMemoryExecutor`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, submission: &TaskSubmission) -> anyhow::Result<ExecutionResult>;
    async fn cancel(&self, task_id: &str) -> anyhow::Result<bool>;
}

const SHELL_METACHARACTERS: &[char] = &[';', '|', '&', '$', '`', '\n', '>', '<'];

fn contains_shell_metacharacters(prompt: &str) -> bool {
    prompt.chars().any(|c| SHELL_METACHARACTERS.contains(&c))
}

/// Spawns the configured agent binary as a subprocess per task, feeding the
/// prompt on stdin and reading the response from stdout. Refuses prompts
/// containing shell metacharacters and working directories outside the
/// sandbox root before ever spawning (§6.4).
pub struct SubprocessExecutor {
    binary: PathBuf,
    allowed_args: Vec<String>,
    sandbox_root: PathBuf,
    cancel_signals: DashMap<String, Arc<Notify>>,
}

impl SubprocessExecutor {
    pub fn new(binary: impl Into<PathBuf>, allowed_args: Vec<String>, sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            allowed_args,
            sandbox_root: sandbox_root.into(),
            cancel_signals: DashMap::new(),
        }
    }

    fn resolve_working_dir(&self, submission: &TaskSubmission) -> anyhow::Result<PathBuf> {
        let wd = submission
            .context
            .as_ref()
            .and_then(|c| c.working_dir.as_ref());
        match wd {
            Some(wd) => {
                let candidate = self.sandbox_root.join(wd);
                let canon = candidate.canonicalize()?;
                let root_canon = self.sandbox_root.canonicalize()?;
                if !canon.starts_with(&root_canon) {
                    anyhow::bail!("working directory escapes sandbox root");
                }
                Ok(canon)
            }
            None => Ok(self.sandbox_root.clone()),
        }
    }
}

#[async_trait]
impl Executor for SubprocessExecutor {
    async fn execute(&self, submission: &TaskSubmission) -> anyhow::Result<ExecutionResult> {
        if contains_shell_metacharacters(&submission.prompt) {
            return Ok(ExecutionResult {
                status: TaskStatus::Failed,
                output: None,
                error: Some("Invalid characters in prompt".to_string()),
                duration_ms: 0,
            });
        }

        let working_dir = match self.resolve_working_dir(submission) {
            Ok(dir) => dir,
            Err(err) => {
                return Ok(ExecutionResult {
                    status: TaskStatus::Failed,
                    output: None,
                    error: Some(format!("sandbox violation: {err}")),
                    duration_ms: 0,
                });
            }
        };

        let start = Instant::now();
        let timeout = Duration::from_secs(submission.timeout_seconds as u64);

        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.allowed_args)
            .arg("--kind")
            .arg(submission.kind.as_str())
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            use tokio::io::AsyncWriteExt;
            stdin.write_all(submission.prompt.as_bytes()).await.ok();
        }

        let cancelled = Arc::new(Notify::new());
        self.cancel_signals
            .insert(submission.task_id.clone(), cancelled.clone());

        let wait_for_exit = async {
            let status = child.wait().await?;
            let mut stdout = String::new();
            if let Some(mut out) = child.stdout.take() {
                out.read_to_string(&mut stdout).await.ok();
            }
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                err.read_to_string(&mut stderr).await.ok();
            }
            Ok::<_, anyhow::Error>((status, stdout, stderr))
        };

        let outcome = tokio::select! {
            res = tokio::time::timeout(timeout, wait_for_exit) => Outcome::Exited(res),
            _ = cancelled.notified() => Outcome::Cancelled,
        };
        self.cancel_signals.remove(&submission.task_id);
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Outcome::Cancelled => {
                child.kill().await.ok();
                Ok(ExecutionResult {
                    status: TaskStatus::Cancelled,
                    output: None,
                    error: None,
                    duration_ms,
                })
            }
            Outcome::Exited(Err(_)) => {
                warn!(task_id = %submission.task_id, "executor timed out");
                child.kill().await.ok();
                Ok(ExecutionResult {
                    status: TaskStatus::Timeout,
                    output: None,
                    error: Some("executor did not respond within timeout_seconds".to_string()),
                    duration_ms,
                })
            }
            Outcome::Exited(Ok(Err(err))) => Err(err),
            Outcome::Exited(Ok(Ok((status, stdout, stderr)))) => {
                if status.success() {
                    info!(task_id = %submission.task_id, duration_ms, "executor completed");
                    Ok(ExecutionResult {
                        status: TaskStatus::Completed,
                        output: Some(stdout.trim().to_string()),
                        error: None,
                        duration_ms,
                    })
                } else {
                    Ok(ExecutionResult {
                        status: TaskStatus::Failed,
                        output: None,
                        error: Some(if stderr.is_empty() {
                            format!("executor exited with {status}")
                        } else {
                            stderr.trim().to_string()
                        }),
                        duration_ms,
                    })
                }
            }
        }
    }

    async fn cancel(&self, task_id: &str) -> anyhow::Result<bool> {
        match self.cancel_signals.get(task_id) {
            Some(signal) => {
                signal.notify_one();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

enum Outcome {
    Exited(Result<anyhow::Result<(std::process::ExitStatus, String, String)>, tokio::time::error::Elapsed>),
    Cancelled,
}

/// Truncate `output` to `cap` characters (§4.4 step 3a, §4.7). `usize::MAX`
/// models the unbounded tiers.
pub fn truncate_output(output: Option<String>, cap: usize) -> Option<String> {
    output.map(|s| {
        if s.chars().count() <= cap {
            s
        } else {
            s.chars().take(cap).collect()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_shell_metacharacters() {
        assert!(contains_shell_metacharacters("; rm -rf /"));
        assert!(contains_shell_metacharacters("a | b"));
        assert!(!contains_shell_metacharacters("a normal prompt"));
    }

    #[test]
    fn truncates_to_character_cap() {
        let out = truncate_output(Some("hello world".into()), 5);
        assert_eq!(out.as_deref(), Some("hello"));
    }

    #[test]
    fn unbounded_cap_leaves_output_untouched() {
        let out = truncate_output(Some("hello world".into()), usize::MAX);
        assert_eq!(out.as_deref(), Some("hello world"));
    }
}
